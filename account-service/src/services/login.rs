//! Login / 2FA engine.
//!
//! Authenticates credentials, decides whether a second factor is required,
//! and hands verified accounts to the token issuer. Failures are a uniform
//! `AuthFailed`: the response never says whether the account exists.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::models::verification::temp_token_key;
use crate::models::{Account, TempTokenRecord};
use crate::services::two_factor::{self, TwoFactorSetup};
use crate::services::{ServiceError, TokenIssuer, TokenPair, TokenUse};
use crate::store::CredentialStore;
use crate::utils::{verify_password, Password, PasswordHashString};

/// Result of the first authentication step.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// No second factor configured; the account is fully authenticated.
    Complete(Account),
    /// Password verified, 2FA pending. No session exists yet.
    TwoFactorRequired {
        account_id: Uuid,
        temp_token: String,
    },
}

#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenIssuer,
    temp_cache: Arc<TtlCache<TempTokenRecord>>,
    totp_issuer: String,
    temp_token_ttl_seconds: i64,
}

impl LoginService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: TokenIssuer,
        temp_cache: Arc<TtlCache<TempTokenRecord>>,
        totp_issuer: String,
        temp_token_ttl_seconds: i64,
    ) -> Self {
        Self {
            store,
            tokens,
            temp_cache,
            totp_issuer,
            temp_token_ttl_seconds,
        }
    }

    /// Verify identifier + password. Returns the account directly, or a
    /// fresh temp token when 2FA is enabled.
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<LoginOutcome, ServiceError> {
        let account = self
            .store
            .find_by_email(identifier)
            .await?
            .ok_or(ServiceError::AuthFailed)?;

        // OAuth-only accounts have no password to check.
        let password_hash = account
            .security
            .password_hash
            .as_ref()
            .ok_or(ServiceError::AuthFailed)?;

        verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(password_hash.clone()),
        )
        .map_err(|_| ServiceError::AuthFailed)?;

        if !account.security.two_factor_enabled {
            tracing::info!(account_id = %account.account_id, "Login successful");
            return Ok(LoginOutcome::Complete(account));
        }

        let (temp_token, jti) = self
            .tokens
            .issue_temp(account.account_id, self.temp_token_ttl_seconds)
            .map_err(ServiceError::Internal)?;

        self.temp_cache.put(
            temp_token_key(&jti),
            TempTokenRecord {
                account_id: account.account_id,
                issued_at: Utc::now(),
            },
            Duration::seconds(self.temp_token_ttl_seconds),
        );

        tracing::info!(account_id = %account.account_id, "Password verified, 2FA required");

        Ok(LoginOutcome::TwoFactorRequired {
            account_id: account.account_id,
            temp_token,
        })
    }

    /// Second step: exchange a live temp token plus a TOTP or backup code
    /// for the account. The temp token is consumed on success; presenting it
    /// again fails.
    pub async fn verify_two_factor(
        &self,
        temp_token: &str,
        code: &str,
    ) -> Result<Account, ServiceError> {
        let parsed = self
            .tokens
            .parse_expected(temp_token, TokenUse::Temp)
            .map_err(|_| ServiceError::AuthFailed)?;

        let key = temp_token_key(&parsed.jti);
        let record = self.temp_cache.get(&key).ok_or(ServiceError::AuthFailed)?;

        let mut account = self
            .store
            .find_by_id(record.account_id)
            .await?
            .ok_or(ServiceError::AuthFailed)?;

        if !account.security.two_factor_enabled {
            return Err(ServiceError::AuthFailed);
        }

        let secret = account
            .security
            .two_factor_secret
            .clone()
            .ok_or(ServiceError::AuthFailed)?;

        let totp_ok = two_factor::verify_totp(
            &secret,
            &self.totp_issuer,
            &account.user_details.email,
            code,
        )?;

        if !totp_ok {
            if !two_factor::consume_backup_code(&mut account.security, code) {
                tracing::warn!(account_id = %account.account_id, "2FA code rejected");
                return Err(ServiceError::AuthFailed);
            }
            // The consumed backup code must not work a second time.
            self.store.save(&account).await?;
            tracing::info!(account_id = %account.account_id, "Backup code consumed");
        }

        self.temp_cache.delete(&key);

        tracing::info!(account_id = %account.account_id, "2FA verified");

        Ok(account)
    }

    /// Mint the session token pair for a fully authenticated account.
    /// Access TTL is the per-account session timeout; the refresh token is
    /// issued only when the caller asked to be remembered.
    pub fn issue_session(
        &self,
        account: &Account,
        remember_me: bool,
    ) -> Result<TokenPair, ServiceError> {
        let access_token = self
            .tokens
            .issue_access(
                account.account_id,
                account.security.session_timeout_seconds,
            )
            .map_err(ServiceError::Internal)?;

        let refresh_token = if remember_me {
            Some(
                self.tokens
                    .issue_refresh(account.account_id)
                    .map_err(ServiceError::Internal)?,
            )
        } else {
            None
        };

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Issue a new access token from a live refresh token. Refresh tokens do
    /// not rotate: the presented token stays valid until its own expiry.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<(Account, String), ServiceError> {
        let parsed = self
            .tokens
            .parse_expected(refresh_token, TokenUse::Refresh)
            .map_err(|e| match e {
                crate::services::TokenError::Expired => ServiceError::TokenExpired,
                crate::services::TokenError::Invalid => ServiceError::TokenInvalid,
            })?;

        let account = self
            .store
            .find_by_id(parsed.account_id)
            .await?
            .ok_or(ServiceError::AuthFailed)?;

        let access_token = self
            .tokens
            .issue_access(
                account.account_id,
                account.security.session_timeout_seconds,
            )
            .map_err(ServiceError::Internal)?;

        Ok((account, access_token))
    }

    /// Begin 2FA enrollment: provision a secret and backup codes. The flag
    /// flips only once `confirm_two_factor` sees a valid first code.
    pub async fn enable_two_factor(
        &self,
        account_id: Uuid,
    ) -> Result<TwoFactorSetup, ServiceError> {
        let mut account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let setup = two_factor::provision(&self.totp_issuer, &account.user_details.email)?;

        account.security.two_factor_secret = Some(setup.secret.clone());
        account.security.backup_code_hashes = setup
            .backup_codes
            .iter()
            .map(|c| crate::utils::hash_backup_code(c))
            .collect();
        account.updated_at = Utc::now();
        self.store.save(&account).await?;

        tracing::info!(account_id = %account_id, "2FA enrollment started");

        Ok(setup)
    }

    /// Confirm enrollment with a first valid code and enable 2FA.
    pub async fn confirm_two_factor(
        &self,
        account_id: Uuid,
        code: &str,
    ) -> Result<(), ServiceError> {
        let mut account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let secret = account
            .security
            .two_factor_secret
            .clone()
            .ok_or_else(|| ServiceError::Validation("2FA enrollment not started".to_string()))?;

        let ok = two_factor::verify_totp(
            &secret,
            &self.totp_issuer,
            &account.user_details.email,
            code,
        )?;
        if !ok {
            return Err(ServiceError::AuthFailed);
        }

        account.security.two_factor_enabled = true;
        account.updated_at = Utc::now();
        self.store.save(&account).await?;

        tracing::info!(account_id = %account_id, "2FA enabled");

        Ok(())
    }
}
