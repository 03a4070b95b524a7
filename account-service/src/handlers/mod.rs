pub mod health;
pub mod internal;
pub mod oauth;
pub mod session;
pub mod signup;
