//! TOTP second factor and single-use backup codes.

use rand::Rng;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::models::SecuritySettings;
use crate::services::ServiceError;
use crate::utils::hash_backup_code;

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP: u64 = 30;
const BACKUP_CODE_COUNT: usize = 8;
const BACKUP_CODE_BYTES: usize = 5;

/// Provisioning material handed to the user exactly once at 2FA setup.
#[derive(Debug, Clone)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_url: String,
    pub backup_codes: Vec<String>,
}

fn build_totp(
    secret_base32: &str,
    issuer: &str,
    account_email: &str,
) -> Result<TOTP, ServiceError> {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Bad TOTP secret: {:?}", e)))?;

    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP,
        secret_bytes,
        Some(issuer.to_string()),
        account_email.to_string(),
    )
    .map_err(|e| ServiceError::Internal(anyhow::anyhow!("TOTP init error: {e}")))
}

/// Generate a fresh secret plus backup codes for enrollment.
pub fn provision(issuer: &str, account_email: &str) -> Result<TwoFactorSetup, ServiceError> {
    let secret = Secret::generate_secret();
    let secret_bytes = secret
        .to_bytes()
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Secret gen error: {:?}", e)))?;

    let totp = TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP,
        secret_bytes,
        Some(issuer.to_string()),
        account_email.to_string(),
    )
    .map_err(|e| ServiceError::Internal(anyhow::anyhow!("TOTP init error: {e}")))?;

    let (backup_codes, _) = generate_backup_codes();

    Ok(TwoFactorSetup {
        secret: totp.get_secret_base32(),
        otpauth_url: totp.get_url(),
        backup_codes,
    })
}

/// Check a TOTP code against the stored secret (current step, skew 1).
pub fn verify_totp(
    secret_base32: &str,
    issuer: &str,
    account_email: &str,
    code: &str,
) -> Result<bool, ServiceError> {
    let totp = build_totp(secret_base32, issuer, account_email)?;
    totp.check_current(code)
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("System clock error: {e}")))
}

/// Generate plaintext backup codes and their hashes.
pub fn generate_backup_codes() -> (Vec<String>, Vec<String>) {
    let mut rng = rand::thread_rng();
    let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);
    let mut hashes = Vec::with_capacity(BACKUP_CODE_COUNT);
    for _ in 0..BACKUP_CODE_COUNT {
        let bytes: [u8; BACKUP_CODE_BYTES] = rng.gen();
        let code = hex::encode(bytes);
        hashes.push(hash_backup_code(&code));
        codes.push(code);
    }
    (codes, hashes)
}

/// Consume a backup code: if `code` matches an unused hash, remove that hash
/// and return true. Each code works exactly once.
pub fn consume_backup_code(security: &mut SecuritySettings, code: &str) -> bool {
    let hash = hash_backup_code(code);
    let before = security.backup_code_hashes.len();
    security.backup_code_hashes.retain(|h| h != &hash);
    security.backup_code_hashes.len() < before
}
