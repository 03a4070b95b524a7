//! Account model - the durable identity record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default per-account session timeout in seconds.
pub const DEFAULT_SESSION_TIMEOUT_SECONDS: i64 = 3600;

/// How the account was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Local,
    OAuth,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Local => "local",
            AccountType::OAuth => "oauth",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "oauth" => AccountType::OAuth,
            _ => AccountType::Local,
        }
    }
}

/// User-facing identity details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
}

/// Credential and second-factor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    pub password_hash: Option<String>,
    pub two_factor_enabled: bool,
    pub two_factor_secret: Option<String>,
    pub backup_code_hashes: Vec<String>,
    pub session_timeout_seconds: i64,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            password_hash: None,
            two_factor_enabled: false,
            two_factor_secret: None,
            backup_code_hashes: Vec::new(),
            session_timeout_seconds: DEFAULT_SESSION_TIMEOUT_SECONDS,
        }
    }
}

/// Account entity, owned by the credential store.
#[derive(Debug, Clone)]
pub struct Account {
    pub account_id: Uuid,
    pub user_details: UserDetails,
    pub security: SecuritySettings,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a local account from a completed signup.
    pub fn new_local(email: String, name: Option<String>, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            account_id: Uuid::new_v4(),
            user_details: UserDetails {
                email,
                name,
                email_verified: true,
            },
            security: SecuritySettings {
                password_hash: Some(password_hash),
                ..SecuritySettings::default()
            },
            account_type: AccountType::Local,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an account for a first-time OAuth login.
    pub fn new_oauth(email: String, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            account_id: Uuid::new_v4(),
            user_details: UserDetails {
                email,
                name,
                email_verified: true,
            },
            security: SecuritySettings::default(),
            account_type: AccountType::OAuth,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> AccountResponse {
        AccountResponse {
            account_id: self.account_id,
            email: self.user_details.email.clone(),
            name: self.user_details.name.clone(),
            email_verified: self.user_details.email_verified,
            account_type: self.account_type,
            two_factor_enabled: self.security.two_factor_enabled,
            created_at: self.created_at,
        }
    }
}

/// Account response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
    pub account_type: AccountType,
    pub two_factor_enabled: bool,
    pub created_at: DateTime<Utc>,
}
