//! Key-value storage trait and the in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;

/// String key-value store with prefix scanning.
///
/// Implementations must be safe to share across tasks. Errors surface as
/// `ExtractionError::Cache` and callers treat them as misses.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value under a key, replacing any existing value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory key-value store.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().unwrap().remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryKvStore::new();
        store.put("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        store.put("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        // deleting again is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_prefix_scan() {
        let store = MemoryKvStore::new();
        store.put("detail:1", "x").await.unwrap();
        store.put("detail:2", "y").await.unwrap();
        store.put("other:1", "z").await.unwrap();

        let mut keys = store.keys("detail:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["detail:1", "detail:2"]);
    }
}
