//! In-memory credential store used by the test suite.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{Account, OAuthPermissionRecord};
use crate::services::ServiceError;
use crate::store::CredentialStore;

#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
    permissions: Mutex<HashMap<Uuid, OAuthPermissionRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(msg: &str) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("store mutex poisoned: {msg}"))
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        let accounts = self.accounts.lock().map_err(|e| poisoned(&e.to_string()))?;
        Ok(accounts
            .values()
            .find(|a| a.user_details.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError> {
        let accounts = self.accounts.lock().map_err(|e| poisoned(&e.to_string()))?;
        Ok(accounts.get(&account_id).cloned())
    }

    async fn create(&self, account: &Account) -> Result<(), ServiceError> {
        let mut accounts = self.accounts.lock().map_err(|e| poisoned(&e.to_string()))?;
        let duplicate = accounts
            .values()
            .any(|a| a.user_details.email.eq_ignore_ascii_case(&account.user_details.email));
        if duplicate {
            return Err(ServiceError::UserExists);
        }
        accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn save(&self, account: &Account) -> Result<(), ServiceError> {
        let mut accounts = self.accounts.lock().map_err(|e| poisoned(&e.to_string()))?;
        if !accounts.contains_key(&account.account_id) {
            return Err(ServiceError::UserNotFound);
        }
        accounts.insert(account.account_id, account.clone());
        Ok(())
    }

    async fn find_or_create_permissions(
        &self,
        account_id: Uuid,
    ) -> Result<OAuthPermissionRecord, ServiceError> {
        let mut permissions = self
            .permissions
            .lock()
            .map_err(|e| poisoned(&e.to_string()))?;
        Ok(permissions
            .entry(account_id)
            .or_insert_with(|| OAuthPermissionRecord::new(account_id))
            .clone())
    }

    async fn save_permissions(&self, record: &OAuthPermissionRecord) -> Result<(), ServiceError> {
        let mut permissions = self
            .permissions
            .lock()
            .map_err(|e| poisoned(&e.to_string()))?;
        permissions.insert(record.account_id, record.clone());
        Ok(())
    }
}
