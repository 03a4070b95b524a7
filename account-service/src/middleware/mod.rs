pub mod internal_auth;

pub use internal_auth::{internal_auth_middleware, CurrentService};
