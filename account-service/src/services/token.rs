//! Token issuer: mints and parses signed, expiring tokens.
//!
//! Stateless given the process-wide secret. Parsing distinguishes a bad
//! signature from an elapsed TTL so callers can report `TokenInvalid` vs
//! `TokenExpired` correctly.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// What a token is good for. A temp token can never be presented where an
/// access token is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    Access,
    Refresh,
    Temp,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenUse::Access => "access",
            TokenUse::Refresh => "refresh",
            TokenUse::Temp => "temp",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "access" => Some(TokenUse::Access),
            "refresh" => Some(TokenUse::Refresh),
            "temp" => Some(TokenUse::Temp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    /// Subject (account ID)
    sub: String,
    /// Expiration time (Unix timestamp)
    exp: i64,
    /// Issued at (Unix timestamp)
    iat: i64,
    /// Token ID
    jti: String,
    /// Discriminator: access, refresh, or temp
    token_use: String,
}

/// Decoded claims of a structurally valid, unexpired token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub jti: String,
    pub token_use: TokenUse,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Access + optional refresh token, as handed to the session layer.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    refresh_token_expiry_days: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, refresh_token_expiry_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            refresh_token_expiry_days,
        }
    }

    fn issue(
        &self,
        account_id: Uuid,
        ttl: Duration,
        token_use: TokenUse,
    ) -> Result<(String, String), anyhow::Error> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let claims = Claims {
            sub: account_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: jti.clone(),
            token_use: token_use.as_str().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode {} token: {}", token_use.as_str(), e))?;

        Ok((token, jti))
    }

    /// Mint an access token with the caller-supplied TTL (the per-account
    /// session timeout).
    pub fn issue_access(
        &self,
        account_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, anyhow::Error> {
        let (token, _) = self.issue(account_id, Duration::seconds(ttl_seconds), TokenUse::Access)?;
        Ok(token)
    }

    /// Mint a refresh token. Issuance is non-rotating: presenting a refresh
    /// token does not invalidate it.
    pub fn issue_refresh(&self, account_id: Uuid) -> Result<String, anyhow::Error> {
        let (token, _) = self.issue(
            account_id,
            Duration::days(self.refresh_token_expiry_days),
            TokenUse::Refresh,
        )?;
        Ok(token)
    }

    /// Mint a temp (2FA pending) token. Returns the token and its jti so the
    /// caller can register it for single use.
    pub fn issue_temp(
        &self,
        account_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<(String, String), anyhow::Error> {
        self.issue(account_id, Duration::seconds(ttl_seconds), TokenUse::Temp)
    }

    /// Parse and verify a token. `Expired` is returned only when the
    /// signature checked out but the TTL has elapsed; everything else is
    /// `Invalid`.
    pub fn parse(&self, token: &str) -> Result<ParsedToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        let claims = data.claims;
        let account_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Invalid)?;
        let token_use = TokenUse::parse(&claims.token_use).ok_or(TokenError::Invalid)?;

        Ok(ParsedToken {
            account_id,
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or_default(),
            issued_at: Utc.timestamp_opt(claims.iat, 0).single().unwrap_or_default(),
            jti: claims.jti,
            token_use,
        })
    }

    /// Parse a token and require a specific use.
    pub fn parse_expected(
        &self,
        token: &str,
        expected: TokenUse,
    ) -> Result<ParsedToken, TokenError> {
        let parsed = self.parse(token)?;
        if parsed.token_use != expected {
            return Err(TokenError::Invalid);
        }
        Ok(parsed)
    }
}
