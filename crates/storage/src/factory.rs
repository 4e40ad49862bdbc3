// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opening the backing store of an object

use crate::memory::MemoryStore;
use crate::store::{Store, StoreError};
use crate::wal_store::WalStore;
use async_trait::async_trait;
use kt_core::StoreId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Opens the storage that backs one object store
#[async_trait]
pub trait StoreFactory: Send + Sync + 'static {
    type Store: Store;

    /// Open (or create) the store for `id` within `kind`
    async fn open(&self, kind: &str, id: &StoreId) -> Result<Self::Store, StoreError>;
}

/// Hands out one shared [`MemoryStore`] per object
///
/// Reopening an id returns the same data, as a durable backend would.
#[derive(Default)]
pub struct MemoryStoreFactory {
    stores: Mutex<HashMap<(String, StoreId), MemoryStore>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    type Store = MemoryStore;

    async fn open(&self, kind: &str, id: &StoreId) -> Result<MemoryStore, StoreError> {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        Ok(stores
            .entry((kind.to_string(), id.clone()))
            .or_default()
            .clone())
    }
}

/// Lays stores out as `<root>/<kind>/<id>.wal`
pub struct WalStoreFactory {
    root: PathBuf,
}

impl WalStoreFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, kind: &str, id: &StoreId) -> PathBuf {
        self.root.join(kind).join(format!("{}.wal", id))
    }
}

#[async_trait]
impl StoreFactory for WalStoreFactory {
    type Store = WalStore;

    async fn open(&self, kind: &str, id: &StoreId) -> Result<WalStore, StoreError> {
        WalStore::open(&self.path_for(kind, id))
    }
}
