//! Credential store boundary.
//!
//! The durable store is consumed through a narrow contract so the pipelines
//! never touch the database driver directly. `PgCredentialStore` is the
//! production implementation; `MemoryCredentialStore` backs the test suite.

mod memory;
mod pg;

pub use memory::MemoryCredentialStore;
pub use pg::PgCredentialStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Account, OAuthPermissionRecord};
use crate::services::ServiceError;

/// Lookup/create/update of Account and OAuthPermissionRecord.
///
/// `create` must report `ServiceError::UserExists` when the store's email
/// uniqueness constraint rejects the insert.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError>;

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError>;

    async fn create(&self, account: &Account) -> Result<(), ServiceError>;

    async fn save(&self, account: &Account) -> Result<(), ServiceError>;

    async fn find_or_create_permissions(
        &self,
        account_id: Uuid,
    ) -> Result<OAuthPermissionRecord, ServiceError>;

    async fn save_permissions(&self, record: &OAuthPermissionRecord) -> Result<(), ServiceError>;
}
