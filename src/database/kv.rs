//! Key-value persistence abstraction.
//!
//! The store persists each collection as one JSON value under a fixed key,
//! so the backend only needs get/set/remove of whole values.

use crate::error::StorageError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Backend holding JSON values under string keys.
///
/// Calls are blocking; the store runs them off the async executor.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process backend; contents are lost when dropped.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get_item("k").unwrap().is_none());

        store.set_item("k", &json!([1, 2])).unwrap();
        assert_eq!(store.get_item("k").unwrap(), Some(json!([1, 2])));

        store.remove_item("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_absent_key() {
        let store = MemoryStore::new();
        assert!(store.remove_item("missing").is_ok());
    }
}
