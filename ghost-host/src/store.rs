// ghost-host: Process-lifetime key-value store

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

/// One stored value with its write timestamp.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub value: Value,
    pub written_at: DateTime<Utc>,
}

/// Shared process-wide map. No durability: values vanish at process exit.
#[derive(Default)]
pub struct KvStore {
    entries: DashMap<String, StoredValue>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(
            key.into(),
            StoredValue {
                value,
                written_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keys in sorted order for reproducible listings.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
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
    use serde_json::json;

    #[test]
    fn test_set_get_round_trip() {
        let store = KvStore::new();
        store.set("k", json!({"v": 1}));
        assert_eq!(store.get("k").unwrap().value, json!({"v": 1}));
    }

    #[test]
    fn test_delete_then_get_misses() {
        let store = KvStore::new();
        store.set("k", json!(1));
        assert!(store.delete("k"));
        assert!(store.get("k").is_none());
        assert!(!store.delete("k"));
    }

    #[test]
    fn test_keys_sorted_and_clear() {
        let store = KvStore::new();
        store.set("b", json!(2));
        store.set("a", json!(1));
        assert_eq!(store.keys(), vec!["a", "b"]);
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_updates_timestamp() {
        let store = KvStore::new();
        store.set("k", json!(1));
        let first = store.get("k").unwrap().written_at;
        store.set("k", json!(2));
        let second = store.get("k").unwrap();
        assert_eq!(second.value, json!(2));
        assert!(second.written_at >= first);
    }
}
