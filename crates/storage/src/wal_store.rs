// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store: a WAL replayed into an in-memory key space

use crate::state::KeySpace;
use crate::store::{ListOptions, Mutation, Store, StoreError};
use crate::wal::Wal;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Store whose every batch is one synced WAL entry
///
/// The log and the key space sit behind one lock, so a batch is either
/// logged and applied or neither.
pub struct WalStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    wal: Wal,
    keys: KeySpace,
}

impl WalStore {
    /// Open the store at `path`, replaying any existing log
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::wal::WalError::from)?;
        }

        let wal = Wal::open(path)?;
        let mut keys = KeySpace::new();
        let batches = Wal::replay(path)?;
        let replayed = batches.len();
        for batch in batches {
            keys.apply(&batch);
        }

        tracing::debug!(
            path = %path.display(),
            batches = replayed,
            keys = keys.len(),
            "opened WAL store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner { wal, keys }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Store for WalStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.keys.get(key).cloned())
    }

    async fn get_many(&self, keys: &[String]) -> Result<BTreeMap<String, Value>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.keys.get_many(keys))
    }

    async fn list(&self, options: &ListOptions) -> Result<BTreeMap<String, Value>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.keys.list(options))
    }

    async fn apply(&self, batch: Vec<Mutation>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.wal.append(&batch)?;
        inner.keys.apply(&batch);
        Ok(())
    }

    async fn erase_all(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.wal.truncate()?;
        inner.keys.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_store_tests.rs"]
mod tests;
