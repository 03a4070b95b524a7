pub mod account;
pub mod internal_identity;
pub mod oauth_permission;
pub mod verification;

pub use account::{Account, AccountResponse, AccountType, SecuritySettings, UserDetails};
pub use internal_identity::{AuthenticatedVia, InternalServiceIdentity};
pub use oauth_permission::OAuthPermissionRecord;
pub use verification::{TempTokenRecord, VerificationRecord};
