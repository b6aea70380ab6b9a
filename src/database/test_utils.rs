//! Test doubles for the storage layer.

use super::{KeyValueStore, MemoryStore};
use crate::error::StorageError;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Memory-backed store whose reads and writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected() -> StorageError {
        StorageError::Worker("injected failure".to_string())
    }
}

impl KeyValueStore for FlakyStore {
    fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.remove_item(key)
    }
}
