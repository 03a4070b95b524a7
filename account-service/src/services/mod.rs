pub mod email;
pub mod error;
pub mod login;
pub mod oauth;
pub mod signup;
pub mod token;
pub mod two_factor;

pub use email::{EmailSender, MockEmailSender, SentEmail, SmtpEmailSender};
pub use error::ServiceError;
pub use login::{LoginOutcome, LoginService};
pub use oauth::{
    GoogleProvider, MockOAuthProvider, OAuthProvider, OAuthService, OwnershipCheck,
    ProviderTokenInfo, ProviderTokens, ProviderUserInfo, ScopeCheck,
};
pub use signup::{ProfileData, SignupService, VerificationStarted};
pub use token::{ParsedToken, TokenError, TokenIssuer, TokenPair, TokenUse};
pub use two_factor::TwoFactorSetup;
