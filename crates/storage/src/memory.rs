// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store

use crate::state::KeySpace;
use crate::store::{ListOptions, Mutation, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Volatile store backed by an ordered map
///
/// Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    keys: Arc<Mutex<KeySpace>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `apply` and `erase_all` fail
    #[cfg(any(test, feature = "test-support"))]
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of everything currently stored
    pub fn snapshot(&self) -> KeySpace {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        Ok(keys.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> Result<BTreeMap<String, Value>, StoreError> {
        let space = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        Ok(space.get_many(keys))
    }

    async fn list(&self, options: &ListOptions) -> Result<BTreeMap<String, Value>, StoreError> {
        let keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        Ok(keys.list(options))
    }

    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.apply(&batch);
        Ok(())
    }

    async fn erase_all(&self) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
