//! Cache-resident verification records for the multi-step signup pipeline,
//! password reset, and pending 2FA logins.
//!
//! The signup steps form one chain per email: a later step's record replaces
//! the earlier step's, and every record is single-use.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A short-lived proof record. Expiry is owned by the cache entry, not the
/// record itself.
#[derive(Debug, Clone)]
pub enum VerificationRecord {
    /// Pre-account: the address has asked to sign up but is unproven.
    EmailVerification {
        email: String,
        token: String,
        callback_url: String,
        created_at: DateTime<Utc>,
    },
    /// The address is proven; profile data is still missing. Produced only
    /// by consuming an EmailVerification record.
    ProfileCompletion {
        email: String,
        token: String,
        email_verified: bool,
        created_at: DateTime<Utc>,
    },
    /// An existing account asked to reset its password.
    PasswordReset {
        account_id: Uuid,
        email: String,
        token: String,
        created_at: DateTime<Utc>,
    },
}

impl VerificationRecord {
    pub fn email(&self) -> &str {
        match self {
            VerificationRecord::EmailVerification { email, .. }
            | VerificationRecord::ProfileCompletion { email, .. }
            | VerificationRecord::PasswordReset { email, .. } => email,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            VerificationRecord::EmailVerification { token, .. }
            | VerificationRecord::ProfileCompletion { token, .. }
            | VerificationRecord::PasswordReset { token, .. } => token,
        }
    }

    /// Cache key for this record. Signup steps are keyed by email so that a
    /// re-request overwrites the pending record for the same address;
    /// password resets are keyed by their random token.
    pub fn cache_key(&self) -> String {
        match self {
            VerificationRecord::EmailVerification { email, .. } => email_verification_key(email),
            VerificationRecord::ProfileCompletion { email, .. } => profile_completion_key(email),
            VerificationRecord::PasswordReset { token, .. } => password_reset_key(token),
        }
    }
}

pub fn email_verification_key(email: &str) -> String {
    format!("signup:email:{}", email.to_lowercase())
}

pub fn profile_completion_key(email: &str) -> String {
    format!("signup:profile:{}", email.to_lowercase())
}

pub fn password_reset_key(token: &str) -> String {
    format!("reset:{token}")
}

pub fn temp_token_key(jti: &str) -> String {
    format!("2fa:{jti}")
}

/// "Password verified, 2FA pending" marker keyed by the temp token's jti.
/// Single-purpose: a valid 2FA code consumes it, and that is the only path
/// from a temp token to a real session.
#[derive(Debug, Clone)]
pub struct TempTokenRecord {
    pub account_id: Uuid,
    pub issued_at: DateTime<Utc>,
}
