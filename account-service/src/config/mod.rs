use serde::Deserialize;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub otlp_endpoint: Option<String>,
    pub allowed_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub signup: SignupConfig,
    pub google: GoogleOAuthConfig,
    pub smtp: SmtpConfig,
    pub internal: InternalAuthConfig,
    pub totp_issuer: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub refresh_token_expiry_days: i64,
    pub temp_token_expiry_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupConfig {
    pub verification_ttl_minutes: i64,
    pub profile_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
    /// When set, tokens are returned in API responses instead of emailed.
    /// Never enable outside dev and test environments.
    pub mock_email: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

/// A peer service allowed on the internal surface.
#[derive(Debug, Clone, Deserialize)]
pub struct InternalPeer {
    pub service_id: String,
    pub service_name: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InternalAuthConfig {
    pub peers: Vec<InternalPeer>,
    /// Accept a valid client certificate without a per-service secret.
    pub allow_certificate_only: bool,
}

impl AccountConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AccountConfig {
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("account-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: get_env("PORT", Some("8080"), is_prod)?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("2"), is_prod)?
                    .parse()
                    .unwrap_or(2),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", None, is_prod)?,
                refresh_token_expiry_days: get_env(
                    "JWT_REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
                temp_token_expiry_seconds: get_env(
                    "JWT_TEMP_TOKEN_EXPIRY_SECONDS",
                    Some("300"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
            },
            signup: SignupConfig {
                verification_ttl_minutes: get_env(
                    "SIGNUP_VERIFICATION_TTL_MINUTES",
                    Some("30"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(30),
                profile_ttl_minutes: get_env("SIGNUP_PROFILE_TTL_MINUTES", Some("30"), is_prod)?
                    .parse()
                    .unwrap_or(30),
                reset_ttl_minutes: get_env("PASSWORD_RESET_TTL_MINUTES", Some("15"), is_prod)?
                    .parse()
                    .unwrap_or(15),
                mock_email: get_env("MOCK_EMAIL", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
            },
            google: GoogleOAuthConfig {
                client_id: get_env("GOOGLE_CLIENT_ID", None, is_prod)?,
                client_secret: get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?,
                redirect_uri: get_env("GOOGLE_REDIRECT_URI", None, is_prod)?,
                frontend_url: get_env(
                    "GOOGLE_FRONTEND_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                port: get_env("SMTP_PORT", Some("587"), is_prod)?
                    .parse()
                    .unwrap_or(587),
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from: get_env(
                    "SMTP_FROM",
                    Some("no-reply@localhost"),
                    is_prod,
                )?,
            },
            internal: InternalAuthConfig {
                peers: parse_internal_peers(&get_env("INTERNAL_SERVICES", Some(""), is_prod)?)?,
                allow_certificate_only: get_env(
                    "INTERNAL_ALLOW_CERTIFICATE_ONLY",
                    Some("false"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(false),
            },
            totp_issuer: get_env("TOTP_ISSUER", Some("account-service"), is_prod)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.jwt.temp_token_expiry_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_TEMP_TOKEN_EXPIRY_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.jwt.secret.len() < 32 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least 32 bytes in production"
                )));
            }

            if self.signup.mock_email {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "MOCK_EMAIL must be disabled in production"
                )));
            }
        }

        Ok(())
    }
}

/// `INTERNAL_SERVICES` format: `id:name:secret` entries separated by commas.
fn parse_internal_peers(raw: &str) -> Result<Vec<InternalPeer>, AppError> {
    let mut peers = Vec::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let mut parts = entry.trim().splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(name), Some(secret))
                if !id.is_empty() && !name.is_empty() && !secret.is_empty() =>
            {
                peers.push(InternalPeer {
                    service_id: id.to_string(),
                    service_name: name.to_string(),
                    secret: secret.to_string(),
                });
            }
            _ => {
                return Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "Invalid INTERNAL_SERVICES entry: {}",
                    entry
                ))));
            }
        }
    }
    Ok(peers)
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
