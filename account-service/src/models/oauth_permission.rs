//! Per-account record of OAuth scopes the user has granted over time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Scopes are append-only here: new grants are unioned in, and nothing ever
/// removes a previously recorded scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthPermissionRecord {
    pub account_id: Uuid,
    pub scopes: BTreeSet<String>,
    pub last_updated: DateTime<Utc>,
}

impl OAuthPermissionRecord {
    pub fn new(account_id: Uuid) -> Self {
        Self {
            account_id,
            scopes: BTreeSet::new(),
            last_updated: Utc::now(),
        }
    }

    /// Union `granted` into the stored set. Returns the scopes that were new.
    pub fn union_scopes<I>(&mut self, granted: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = Vec::new();
        for scope in granted {
            if self.scopes.insert(scope.clone()) {
                added.push(scope);
            }
        }
        if !added.is_empty() {
            self.last_updated = Utc::now();
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_append_only() {
        let mut record = OAuthPermissionRecord::new(Uuid::new_v4());
        record.union_scopes(vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        // A narrower grant never drops previously recorded scopes.
        let added = record.union_scopes(vec!["a".to_string()]);
        assert!(added.is_empty());
        assert_eq!(record.scopes.len(), 3);

        let added = record.union_scopes(vec!["a".to_string(), "d".to_string()]);
        assert_eq!(added, vec!["d".to_string()]);
        assert_eq!(record.scopes.len(), 4);
    }
}
