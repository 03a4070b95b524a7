//! Multi-step signup pipeline and password reset, driven by short-lived
//! cached proof tokens.
//!
//! State machine per email: NoRecord -> EmailPending -> ProfilePending ->
//! Account. Each transition consumes the previous step's record, so a token
//! can never be replayed once the chain has moved on.

use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::SignupConfig;
use crate::models::verification::{
    email_verification_key, password_reset_key, profile_completion_key,
};
use crate::models::{Account, VerificationRecord};
use crate::services::{EmailSender, ServiceError};
use crate::store::CredentialStore;
use crate::utils::{hash_password, Password};

/// Profile data supplied at the final signup step.
#[derive(Debug, Clone)]
pub struct ProfileData {
    pub password: String,
    pub name: Option<String>,
}

/// Outcome of a verification request. The token is echoed back only in mock
/// mode, for test and development flows.
#[derive(Debug, Clone)]
pub struct VerificationStarted {
    pub email: String,
    pub callback_url: String,
    pub token: Option<String>,
}

#[derive(Clone)]
pub struct SignupService {
    cache: Arc<TtlCache<VerificationRecord>>,
    store: Arc<dyn CredentialStore>,
    email: Arc<dyn EmailSender>,
    config: SignupConfig,
}

impl SignupService {
    pub fn new(
        cache: Arc<TtlCache<VerificationRecord>>,
        store: Arc<dyn CredentialStore>,
        email: Arc<dyn EmailSender>,
        config: SignupConfig,
    ) -> Self {
        Self {
            cache,
            store,
            email,
            config,
        }
    }

    /// Step 1: store an EmailVerification record and send the token out.
    /// A second request for the same email overwrites the first record, so
    /// the earlier token stops working.
    pub async fn request_email_verification(
        &self,
        email: &str,
        callback_url: &str,
    ) -> Result<VerificationStarted, ServiceError> {
        if email.trim().is_empty() {
            return Err(ServiceError::Validation("email is required".to_string()));
        }
        if callback_url.trim().is_empty() {
            return Err(ServiceError::Validation(
                "callbackUrl is required".to_string(),
            ));
        }

        let email = email.trim().to_lowercase();
        let token = generate_random_token();
        let record = VerificationRecord::EmailVerification {
            email: email.clone(),
            token: token.clone(),
            callback_url: callback_url.to_string(),
            created_at: Utc::now(),
        };
        self.cache.put(
            record.cache_key(),
            record,
            Duration::minutes(self.config.verification_ttl_minutes),
        );

        tracing::info!(email = %email, "Email verification requested");

        if self.config.mock_email {
            return Ok(VerificationStarted {
                email,
                callback_url: callback_url.to_string(),
                token: Some(token),
            });
        }

        // Fire-and-forget: delivery failure is logged, not surfaced.
        let sender = self.email.clone();
        let to = email.clone();
        let callback = callback_url.to_string();
        tokio::spawn(async move {
            if let Err(e) = sender.send_verification_email(&to, &token, &callback).await {
                tracing::error!(error = %e, email = %to, "Verification email failed");
            }
        });

        Ok(VerificationStarted {
            email,
            callback_url: callback_url.to_string(),
            token: None,
        })
    }

    /// Step 2: consume the EmailVerification record and replace it with a
    /// ProfileCompletion record carrying a fresh token.
    pub async fn verify_email(&self, token: &str) -> Result<(String, String), ServiceError> {
        let (key, record) = self
            .cache
            .find(|r| {
                matches!(r, VerificationRecord::EmailVerification { token: t, .. } if t == token)
            })
            .ok_or(ServiceError::TokenInvalid)?;

        let email = record.email().to_string();
        self.cache.delete(&key);

        let profile_token = generate_random_token();
        let profile_record = VerificationRecord::ProfileCompletion {
            email: email.clone(),
            token: profile_token.clone(),
            email_verified: true,
            created_at: Utc::now(),
        };
        self.cache.put(
            profile_record.cache_key(),
            profile_record,
            Duration::minutes(self.config.profile_ttl_minutes),
        );

        tracing::info!(email = %email, "Email verified, awaiting profile");

        Ok((profile_token, email))
    }

    /// Step 3: consume the ProfileCompletion record and create the account.
    /// A duplicate email surfaces as `UserExists` (signup enumeration is an
    /// accepted trade-off, unlike login).
    pub async fn complete_profile(
        &self,
        token: &str,
        profile: ProfileData,
    ) -> Result<Account, ServiceError> {
        let (key, record) = self
            .cache
            .find(|r| {
                matches!(r, VerificationRecord::ProfileCompletion { token: t, .. } if t == token)
            })
            .ok_or(ServiceError::TokenInvalid)?;

        let (email, email_verified) = match &record {
            VerificationRecord::ProfileCompletion {
                email,
                email_verified,
                ..
            } => (email.clone(), *email_verified),
            _ => return Err(ServiceError::TokenInvalid),
        };
        if !email_verified {
            return Err(ServiceError::TokenInvalid);
        }

        if profile.password.len() < 8 {
            return Err(ServiceError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let password_hash = hash_password(&Password::new(profile.password))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {e}")))?;

        let account = Account::new_local(email.clone(), profile.name, password_hash.into_string());
        self.store.create(&account).await?;

        // Consume only after the account exists, so the token cannot be
        // replayed once the chain completed.
        self.cache.delete(&key);

        tracing::info!(account_id = %account.account_id, email = %email, "Account created");

        Ok(account)
    }

    /// Drop any pending record for this email, regardless of step. Always
    /// succeeds; cancelling nothing is a no-op.
    pub async fn cancel_email_verification(&self, email: &str) {
        let email = email.trim().to_lowercase();
        self.cache.delete(&email_verification_key(&email));
        self.cache.delete(&profile_completion_key(&email));
        tracing::debug!(email = %email, "Pending verification cancelled");
    }

    /// Password reset request. Always succeeds from the caller's view; an
    /// unknown address produces no record and no email.
    pub async fn request_password_reset(
        &self,
        email: &str,
        callback_url: &str,
    ) -> Result<Option<String>, ServiceError> {
        let Some(account) = self.store.find_by_email(email).await? else {
            return Ok(None);
        };

        let token = generate_random_token();
        let record = VerificationRecord::PasswordReset {
            account_id: account.account_id,
            email: account.user_details.email.clone(),
            token: token.clone(),
            created_at: Utc::now(),
        };
        self.cache.put(
            record.cache_key(),
            record,
            Duration::minutes(self.config.reset_ttl_minutes),
        );

        tracing::info!(account_id = %account.account_id, "Password reset requested");

        if self.config.mock_email {
            return Ok(Some(token));
        }

        let sender = self.email.clone();
        let to = account.user_details.email.clone();
        let callback = callback_url.to_string();
        tokio::spawn(async move {
            if let Err(e) = sender
                .send_password_reset_email(&to, &token, &callback)
                .await
            {
                tracing::error!(error = %e, email = %to, "Password reset email failed");
            }
        });

        Ok(None)
    }

    /// Consume a reset record and store the new password hash.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<Uuid, ServiceError> {
        let key = password_reset_key(token);
        let record = self.cache.get(&key).ok_or(ServiceError::TokenInvalid)?;

        let account_id = match record {
            VerificationRecord::PasswordReset { account_id, .. } => account_id,
            _ => return Err(ServiceError::TokenInvalid),
        };

        if new_password.len() < 8 {
            return Err(ServiceError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let mut account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let password_hash = hash_password(&Password::new(new_password.to_string()))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {e}")))?;
        account.security.password_hash = Some(password_hash.into_string());
        account.updated_at = Utc::now();
        self.store.save(&account).await?;

        self.cache.delete(&key);

        tracing::info!(account_id = %account_id, "Password reset completed");

        Ok(account_id)
    }
}

fn generate_random_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}
