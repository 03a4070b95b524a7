//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{
    Account, AccountType, OAuthPermissionRecord, SecuritySettings, UserDetails,
};
use crate::services::ServiceError;
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Flat row shape for the `accounts` table.
#[derive(Debug, FromRow)]
struct AccountRow {
    account_id: Uuid,
    email: String,
    name: Option<String>,
    email_verified: bool,
    password_hash: Option<String>,
    two_factor_enabled: bool,
    two_factor_secret: Option<String>,
    backup_code_hashes: Vec<String>,
    session_timeout_seconds: i64,
    account_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            account_id: row.account_id,
            user_details: UserDetails {
                email: row.email,
                name: row.name,
                email_verified: row.email_verified,
            },
            security: SecuritySettings {
                password_hash: row.password_hash,
                two_factor_enabled: row.two_factor_enabled,
                two_factor_secret: row.two_factor_secret,
                backup_code_hashes: row.backup_code_hashes,
                session_timeout_seconds: row.session_timeout_seconds,
            },
            account_type: AccountType::parse(&row.account_type),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    account_id: Uuid,
    scopes: Vec<String>,
    last_updated: DateTime<Utc>,
}

impl From<PermissionRow> for OAuthPermissionRecord {
    fn from(row: PermissionRow) -> Self {
        OAuthPermissionRecord {
            account_id: row.account_id,
            scopes: row.scopes.into_iter().collect::<BTreeSet<_>>(),
            last_updated: row.last_updated,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

fn db_err(err: sqlx::Error) -> ServiceError {
    ServiceError::Database(anyhow::Error::new(err))
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Account::from))
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Account::from))
    }

    async fn create(&self, account: &Account) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id, email, name, email_verified, password_hash,
                two_factor_enabled, two_factor_secret, backup_code_hashes,
                session_timeout_seconds, account_type, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(account.account_id)
        .bind(&account.user_details.email)
        .bind(&account.user_details.name)
        .bind(account.user_details.email_verified)
        .bind(&account.security.password_hash)
        .bind(account.security.two_factor_enabled)
        .bind(&account.security.two_factor_secret)
        .bind(&account.security.backup_code_hashes)
        .bind(account.security.session_timeout_seconds)
        .bind(account.account_type.as_str())
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(ServiceError::UserExists),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn save(&self, account: &Account) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                email = $2, name = $3, email_verified = $4, password_hash = $5,
                two_factor_enabled = $6, two_factor_secret = $7,
                backup_code_hashes = $8, session_timeout_seconds = $9,
                account_type = $10, updated_at = $11
            WHERE account_id = $1
            "#,
        )
        .bind(account.account_id)
        .bind(&account.user_details.email)
        .bind(&account.user_details.name)
        .bind(account.user_details.email_verified)
        .bind(&account.security.password_hash)
        .bind(account.security.two_factor_enabled)
        .bind(&account.security.two_factor_secret)
        .bind(&account.security.backup_code_hashes)
        .bind(account.security.session_timeout_seconds)
        .bind(account.account_type.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    async fn find_or_create_permissions(
        &self,
        account_id: Uuid,
    ) -> Result<OAuthPermissionRecord, ServiceError> {
        if let Some(row) = sqlx::query_as::<_, PermissionRow>(
            "SELECT * FROM oauth_permissions WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        {
            return Ok(row.into());
        }

        let record = OAuthPermissionRecord::new(account_id);
        sqlx::query(
            r#"
            INSERT INTO oauth_permissions (account_id, scopes, last_updated)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(record.account_id)
        .bind(record.scopes.iter().cloned().collect::<Vec<_>>())
        .bind(record.last_updated)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(record)
    }

    async fn save_permissions(&self, record: &OAuthPermissionRecord) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_permissions (account_id, scopes, last_updated)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id)
            DO UPDATE SET scopes = EXCLUDED.scopes, last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(record.account_id)
        .bind(record.scopes.iter().cloned().collect::<Vec<_>>())
        .bind(record.last_updated)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
