//! OAuth token/scope reconciliation.
//!
//! Exchanges authorization codes through the external provider, tracks
//! granted scopes per account over time, and detects when a fresh token is
//! missing scopes the account previously granted. Provider calls have no
//! retry: a failure surfaces immediately.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

use crate::config::GoogleOAuthConfig;
use crate::models::Account;
use crate::services::ServiceError;
use crate::store::CredentialStore;

/// Identity scopes every token carries; never counted as "missing".
const BASELINE_IDENTITY_SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUserInfo {
    pub email: String,
    pub name: Option<String>,
    pub email_verified: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ProviderTokenInfo {
    pub email: Option<String>,
    pub scopes: BTreeSet<String>,
    pub expires_in: Option<i64>,
}

/// The provider's token/userinfo endpoints, as a narrow contract.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderTokens, ServiceError>;

    async fn get_token_info(&self, access_token: &str) -> Result<ProviderTokenInfo, ServiceError>;

    async fn get_user_info(&self, access_token: &str) -> Result<ProviderUserInfo, ServiceError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<ProviderTokens, ServiceError>;

    async fn revoke_token(&self, token: &str) -> Result<(), ServiceError>;
}

/// Google implementation over HTTPS.
pub struct GoogleProvider {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GoogleProvider {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    const TOKENINFO_URL: &'static str = "https://www.googleapis.com/oauth2/v3/tokeninfo";
    const USERINFO_URL: &'static str = "https://openidconnect.googleapis.com/v1/userinfo";
    const REVOKE_URL: &'static str = "https://oauth2.googleapis.com/revoke";

    pub fn new(config: &GoogleOAuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

fn provider_err(context: &str, e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Provider(format!("{context}: {e}"))
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderTokens, ServiceError> {
        let response = self
            .http
            .post(Self::TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| provider_err("token exchange request failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(provider_err(
                "token exchange rejected",
                format!("{status}: {body}"),
            ));
        }

        response
            .json::<ProviderTokens>()
            .await
            .map_err(|e| provider_err("token exchange response malformed", e))
    }

    async fn get_token_info(&self, access_token: &str) -> Result<ProviderTokenInfo, ServiceError> {
        #[derive(Deserialize)]
        struct TokenInfoBody {
            email: Option<String>,
            scope: Option<String>,
            expires_in: Option<String>,
        }

        let response = self
            .http
            .get(Self::TOKENINFO_URL)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| provider_err("tokeninfo request failed", e))?;

        if !response.status().is_success() {
            return Err(provider_err("tokeninfo rejected", response.status()));
        }

        let body: TokenInfoBody = response
            .json()
            .await
            .map_err(|e| provider_err("tokeninfo response malformed", e))?;

        Ok(ProviderTokenInfo {
            email: body.email,
            scopes: body
                .scope
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            expires_in: body.expires_in.and_then(|s| s.parse().ok()),
        })
    }

    async fn get_user_info(&self, access_token: &str) -> Result<ProviderUserInfo, ServiceError> {
        let response = self
            .http
            .get(Self::USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| provider_err("userinfo request failed", e))?;

        if !response.status().is_success() {
            return Err(provider_err("userinfo rejected", response.status()));
        }

        response
            .json::<ProviderUserInfo>()
            .await
            .map_err(|e| provider_err("userinfo response malformed", e))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<ProviderTokens, ServiceError> {
        let response = self
            .http
            .post(Self::TOKEN_URL)
            .form(&[
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| provider_err("token refresh request failed", e))?;

        if !response.status().is_success() {
            return Err(provider_err("token refresh rejected", response.status()));
        }

        response
            .json::<ProviderTokens>()
            .await
            .map_err(|e| provider_err("token refresh response malformed", e))
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(Self::REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| provider_err("revoke request failed", e))?;

        if !response.status().is_success() {
            return Err(provider_err("revoke rejected", response.status()));
        }
        Ok(())
    }
}

/// Result of comparing stored grants against a live token.
#[derive(Debug, Clone)]
pub struct ScopeCheck {
    pub needs_additional_scopes: bool,
    pub missing_scopes: Vec<String>,
}

/// Result of cross-checking a token against an account.
#[derive(Debug, Clone)]
pub struct OwnershipCheck {
    pub is_valid: bool,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct OAuthService {
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn OAuthProvider>,
}

impl OAuthService {
    pub fn new(store: Arc<dyn CredentialStore>, provider: Arc<dyn OAuthProvider>) -> Self {
        Self { store, provider }
    }

    /// Exchange an authorization code, then find or create the account for
    /// the token's email. Returns (account, tokens, is_new_account).
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<(Account, ProviderTokens, bool), ServiceError> {
        let tokens = self.provider.exchange_code(code, redirect_uri).await?;
        let user_info = self.provider.get_user_info(&tokens.access_token).await?;

        let (account, is_new) = match self.store.find_by_email(&user_info.email).await? {
            Some(account) => (account, false),
            None => {
                let account = Account::new_oauth(user_info.email.clone(), user_info.name.clone());
                self.store.create(&account).await?;
                tracing::info!(account_id = %account.account_id, "OAuth account created");
                (account, true)
            }
        };

        // Record what this grant actually carried.
        if let Some(scope) = &tokens.scope {
            self.union_scopes(
                account.account_id,
                scope.split_whitespace().map(str::to_string),
            )
            .await?;
        }

        Ok((account, tokens, is_new))
    }

    /// Union the live token's granted scopes into the account's permission
    /// record. Scopes are never removed here.
    pub async fn update_account_scopes(
        &self,
        account_id: Uuid,
        access_token: &str,
    ) -> Result<(), ServiceError> {
        let info = self.provider.get_token_info(access_token).await?;
        self.union_scopes(account_id, info.scopes.into_iter()).await
    }

    async fn union_scopes<I>(&self, account_id: Uuid, granted: I) -> Result<(), ServiceError>
    where
        I: Iterator<Item = String>,
    {
        let mut record = self.store.find_or_create_permissions(account_id).await?;
        let added = record.union_scopes(granted);
        if !added.is_empty() {
            tracing::info!(account_id = %account_id, added = ?added, "Scopes recorded");
            self.store.save_permissions(&record).await?;
        }
        Ok(())
    }

    /// Compute stored-minus-current, excluding baseline identity scopes.
    /// A non-empty result means the live token lost grants the account once
    /// held, and the caller should prompt for reauthorization.
    pub async fn check_for_additional_scopes(
        &self,
        account_id: Uuid,
        access_token: &str,
    ) -> Result<ScopeCheck, ServiceError> {
        let stored = self.store.find_or_create_permissions(account_id).await?;
        let current = self.provider.get_token_info(access_token).await?;

        let missing_scopes: Vec<String> = stored
            .scopes
            .iter()
            .filter(|s| !current.scopes.contains(*s))
            .filter(|s| !BASELINE_IDENTITY_SCOPES.contains(&s.as_str()))
            .cloned()
            .collect();

        Ok(ScopeCheck {
            needs_additional_scopes: !missing_scopes.is_empty(),
            missing_scopes,
        })
    }

    /// Guard against a stolen or mixed-up token being attached to the wrong
    /// account: the token's resolved email must match the stored one.
    pub async fn verify_token_ownership(
        &self,
        access_token: &str,
        account_id: Uuid,
    ) -> Result<OwnershipCheck, ServiceError> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let info = self.provider.get_token_info(access_token).await?;

        let Some(token_email) = info.email else {
            return Ok(OwnershipCheck {
                is_valid: false,
                reason: Some("token carries no email claim".to_string()),
            });
        };

        if token_email.eq_ignore_ascii_case(&account.user_details.email) {
            Ok(OwnershipCheck {
                is_valid: true,
                reason: None,
            })
        } else {
            tracing::warn!(account_id = %account_id, "Token email does not match account");
            Ok(OwnershipCheck {
                is_valid: false,
                reason: Some("token email does not match account email".to_string()),
            })
        }
    }
}

/// Scripted provider for tests and local development.
#[derive(Default)]
pub struct MockOAuthProvider {
    /// code -> (tokens, user info)
    pub exchanges: Mutex<std::collections::HashMap<String, (ProviderTokens, ProviderUserInfo)>>,
    /// access token -> token info
    pub token_infos: Mutex<std::collections::HashMap<String, ProviderTokenInfo>>,
    /// access token -> user info
    pub user_infos: Mutex<std::collections::HashMap<String, ProviderUserInfo>>,
    pub revoked: Mutex<Vec<String>>,
}

impl MockOAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_exchange(
        &self,
        code: &str,
        tokens: ProviderTokens,
        user_info: ProviderUserInfo,
    ) {
        self.user_infos
            .lock()
            .unwrap()
            .insert(tokens.access_token.clone(), user_info.clone());
        self.exchanges
            .lock()
            .unwrap()
            .insert(code.to_string(), (tokens, user_info));
    }

    pub fn script_token_info(&self, access_token: &str, info: ProviderTokenInfo) {
        self.token_infos
            .lock()
            .unwrap()
            .insert(access_token.to_string(), info);
    }
}

#[async_trait]
impl OAuthProvider for MockOAuthProvider {
    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<ProviderTokens, ServiceError> {
        self.exchanges
            .lock()
            .unwrap()
            .get(code)
            .map(|(tokens, _)| tokens.clone())
            .ok_or_else(|| ServiceError::Provider("unknown authorization code".to_string()))
    }

    async fn get_token_info(&self, access_token: &str) -> Result<ProviderTokenInfo, ServiceError> {
        self.token_infos
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| ServiceError::Provider("unknown access token".to_string()))
    }

    async fn get_user_info(&self, access_token: &str) -> Result<ProviderUserInfo, ServiceError> {
        self.user_infos
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| ServiceError::Provider("unknown access token".to_string()))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<ProviderTokens, ServiceError> {
        Err(ServiceError::Provider(
            "refresh not scripted in mock".to_string(),
        ))
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ServiceError> {
        self.revoked.lock().unwrap().push(token.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    fn service_with_mock() -> (OAuthService, Arc<MockOAuthProvider>, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let provider = Arc::new(MockOAuthProvider::new());
        let service = OAuthService::new(store.clone(), provider.clone());
        (service, provider, store)
    }

    fn token_info(scopes: &[&str]) -> ProviderTokenInfo {
        ProviderTokenInfo {
            email: Some("alice@x.com".to_string()),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            expires_in: Some(3600),
        }
    }

    #[tokio::test]
    async fn scopes_accumulate_across_tokens() {
        let (service, provider, store) = service_with_mock();
        let account = Account::new_oauth("alice@x.com".to_string(), None);
        store.create(&account).await.unwrap();

        provider.script_token_info("t1", token_info(&["openid", "email", "drive.readonly"]));
        provider.script_token_info("t2", token_info(&["openid", "email", "calendar"]));

        service
            .update_account_scopes(account.account_id, "t1")
            .await
            .unwrap();
        service
            .update_account_scopes(account.account_id, "t2")
            .await
            .unwrap();

        let record = store
            .find_or_create_permissions(account.account_id)
            .await
            .unwrap();
        assert!(record.scopes.contains("drive.readonly"));
        assert!(record.scopes.contains("calendar"));
        assert!(record.scopes.contains("openid"));
    }

    #[tokio::test]
    async fn missing_scopes_exclude_baseline_identity() {
        let (service, provider, store) = service_with_mock();
        let account = Account::new_oauth("alice@x.com".to_string(), None);
        store.create(&account).await.unwrap();

        provider.script_token_info(
            "old",
            token_info(&["openid", "email", "profile", "drive.readonly"]),
        );
        provider.script_token_info("new", token_info(&["drive.readonly"]));

        service
            .update_account_scopes(account.account_id, "old")
            .await
            .unwrap();

        // The new token dropped the identity scopes, but those never count
        // as missing.
        let check = service
            .check_for_additional_scopes(account.account_id, "new")
            .await
            .unwrap();
        assert!(!check.needs_additional_scopes);
        assert!(check.missing_scopes.is_empty());
    }

    #[tokio::test]
    async fn lost_grant_is_reported_missing() {
        let (service, provider, store) = service_with_mock();
        let account = Account::new_oauth("alice@x.com".to_string(), None);
        store.create(&account).await.unwrap();

        provider.script_token_info("old", token_info(&["openid", "drive.readonly", "calendar"]));
        provider.script_token_info("new", token_info(&["openid", "calendar"]));

        service
            .update_account_scopes(account.account_id, "old")
            .await
            .unwrap();

        let check = service
            .check_for_additional_scopes(account.account_id, "new")
            .await
            .unwrap();
        assert!(check.needs_additional_scopes);
        assert_eq!(check.missing_scopes, vec!["drive.readonly".to_string()]);
    }

    #[tokio::test]
    async fn ownership_rejects_foreign_token() {
        let (service, provider, store) = service_with_mock();
        let account = Account::new_oauth("alice@x.com".to_string(), None);
        store.create(&account).await.unwrap();

        let mut info = token_info(&["openid"]);
        info.email = Some("mallory@x.com".to_string());
        provider.script_token_info("stolen", info);

        let check = service
            .verify_token_ownership("stolen", account.account_id)
            .await
            .unwrap();
        assert!(!check.is_valid);
        assert!(check.reason.is_some());
    }

    #[tokio::test]
    async fn exchange_creates_account_once() {
        let (service, provider, store) = service_with_mock();

        let tokens = ProviderTokens {
            access_token: "at-1".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            scope: Some("openid email".to_string()),
        };
        let user = ProviderUserInfo {
            email: "Bob@X.com".to_string(),
            name: Some("Bob".to_string()),
            email_verified: Some(true),
        };
        provider.script_exchange("code-1", tokens.clone(), user.clone());
        provider.script_exchange("code-2", tokens, user);

        let (first, _, is_new) = service
            .exchange_code("code-1", "https://app/callback")
            .await
            .unwrap();
        assert!(is_new);

        let (second, _, is_new) = service
            .exchange_code("code-2", "https://app/callback")
            .await
            .unwrap();
        assert!(!is_new);
        assert_eq!(first.account_id, second.account_id);

        assert!(store.find_by_email("bob@x.com").await.unwrap().is_some());
    }
}
