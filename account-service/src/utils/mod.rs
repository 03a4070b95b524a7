pub mod password;
pub mod validation;

pub use password::{
    hash_backup_code, hash_password, verify_password, Password, PasswordHashString,
};
pub use validation::ValidatedJson;
