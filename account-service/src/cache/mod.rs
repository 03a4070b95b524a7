//! In-process TTL-bound key/value store for short-lived proof records.
//!
//! Explicitly constructed and injected; there is no process-wide singleton.
//! The cache gives no cross-process exclusion: records written by one
//! instance are invisible to another.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

struct Entry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> Entry<T> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// TTL key/value store. `get` treats an expired-but-not-yet-swept entry as
/// absent and removes it; a background sweep is an optimization, not a
/// correctness requirement.
pub struct TtlCache<T> {
    entries: DashMap<String, Entry<T>>,
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TtlCache<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert a value under `key`. An existing entry for the same key is
    /// overwritten, which invalidates any token it carried.
    pub fn put(&self, key: impl Into<String>, value: T, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Utc::now() + ttl,
            },
        );
    }

    /// Fetch a live value. Expired entries are removed and reported absent.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Remove an entry. Missing keys are a no-op.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Scan for the first live entry matching `pred`. Used for token-keyed
    /// lookups where the cache key is the email, not the token.
    pub fn find<F>(&self, pred: F) -> Option<(String, T)>
    where
        F: Fn(&T) -> bool,
    {
        let now = Utc::now();
        let mut dead_keys = Vec::new();
        let mut found = None;
        for entry in self.entries.iter() {
            if entry.value().is_expired(now) {
                dead_keys.push(entry.key().clone());
            } else if found.is_none() && pred(&entry.value().value) {
                found = Some((entry.key().clone(), entry.value().value.clone()));
            }
        }
        for key in dead_keys {
            self.entries.remove(&key);
        }
        found
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_live_value() {
        let cache = TtlCache::new();
        cache.put("k", 42u32, Duration::seconds(60));
        assert_eq!(cache.get("k"), Some(42));
    }

    #[test]
    fn default_builds_an_empty_cache() {
        let cache = TtlCache::<String>::default();
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entry_is_absent_on_read_without_sweep() {
        let cache = TtlCache::new();
        cache.put("k", 1u32, Duration::seconds(-1));
        assert_eq!(cache.get("k"), None);
        // The lazy check also removed the dead entry.
        assert!(cache.is_empty());
    }

    #[test]
    fn put_overwrites_same_key() {
        let cache = TtlCache::new();
        cache.put("k", "old".to_string(), Duration::seconds(60));
        cache.put("k", "new".to_string(), Duration::seconds(60));
        assert_eq!(cache.get("k").as_deref(), Some("new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.put("k", 1, Duration::seconds(60));
        cache.delete("k");
        cache.delete("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn find_skips_expired_entries() {
        let cache = TtlCache::new();
        cache.put("dead", 1u32, Duration::seconds(-1));
        cache.put("live", 2u32, Duration::seconds(60));
        let found = cache.find(|v| *v == 1);
        assert!(found.is_none());
        let found = cache.find(|v| *v == 2);
        assert_eq!(found, Some(("live".to_string(), 2)));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let cache = TtlCache::new();
        cache.put("a", 1u32, Duration::seconds(-1));
        cache.put("b", 2u32, Duration::seconds(60));
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
