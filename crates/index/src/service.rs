// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index service
//!
//! The catalog is mutated only by `on_started`, `on_cursor_advanced` and
//! `reset`. Each mutation persists the touched entry, updates the in-memory
//! map and publishes to subscribers under one lock, so a subscriber opened
//! with `watch` never misses an update made after its full snapshot.

use crate::subscribers::{IndexReceiver, SubscriberId, Subscribers};
use async_trait::async_trait;
use kt_adapters::{IndexSink, SinkError};
use kt_core::{ErrorClass, IndexEntry, IndexMessage, ObjectMeta, StoreId, WriteCursor};
use kt_storage::{ListOptions, Mutation, Store, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Prefix of persisted index entries
const ENTRY_PREFIX: &str = "entry.";

fn entry_key(id: &StoreId) -> String {
    format!("{}{}", ENTRY_PREFIX, id)
}

/// Errors from the index service
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cursor advanced for {0} before it was started")]
    UnknownStore(StoreId),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("undecodable index entry {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to encode index entry: {0}")]
    Encode(#[source] serde_json::Error),
}

impl IndexError {
    pub fn class(&self) -> ErrorClass {
        match self {
            IndexError::UnknownStore(_) => ErrorClass::OrderingViolation,
            IndexError::Store(_) | IndexError::Decode { .. } | IndexError::Encode(_) => {
                ErrorClass::Storage
            }
        }
    }
}

struct Inner<S> {
    store: S,
    entries: Mutex<BTreeMap<StoreId, IndexEntry>>,
    subscribers: Subscribers,
}

/// Global catalog of object stores and their last known cursor
///
/// Cursors here are follower copies and may lag the stores.
pub struct IndexService<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for IndexService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Open index subscription; unregisters itself when dropped
pub struct IndexSubscription {
    id: SubscriberId,
    rx: IndexReceiver,
    subscribers: Subscribers,
}

impl IndexSubscription {
    /// Next message; `None` once the service is gone
    pub async fn recv(&mut self) -> Option<IndexMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<IndexMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for IndexSubscription {
    fn drop(&mut self) {
        self.subscribers.unsubscribe(self.id);
    }
}

impl<S: Store> IndexService<S> {
    /// Load the persisted catalog from `store`
    pub async fn open(store: S) -> Result<Self, IndexError> {
        let persisted = store
            .list(&ListOptions::new().with_prefix(ENTRY_PREFIX))
            .await?;
        let mut entries = BTreeMap::new();
        for (key, value) in persisted {
            let entry: IndexEntry = serde_json::from_value(value)
                .map_err(|source| IndexError::Decode { key, source })?;
            entries.insert(entry.meta.store_id.clone(), entry);
        }
        tracing::info!(entries = entries.len(), "index loaded");

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                entries: Mutex::new(entries),
                subscribers: Subscribers::new(),
            }),
        })
    }

    /// Upsert a store's entry; unset meta fields never erase stored ones
    pub async fn on_started(
        &self,
        meta: ObjectMeta,
        cursor: Option<WriteCursor>,
    ) -> Result<IndexEntry, IndexError> {
        let mut entries = self.inner.entries.lock().await;
        let entry = match entries.get(&meta.store_id) {
            Some(existing) => {
                let mut entry = existing.clone();
                entry.meta.merge(meta);
                if cursor.is_some() {
                    entry.cur_write_id = cursor;
                }
                entry
            }
            None => IndexEntry {
                meta,
                cur_write_id: cursor,
            },
        };

        self.persist(&entry).await?;
        tracing::info!(
            store_id = %entry.meta.store_id,
            name = ?entry.meta.logical_name,
            "store started"
        );
        entries.insert(entry.meta.store_id.clone(), entry.clone());
        self.publish(&entry);
        Ok(entry)
    }

    /// Move a known store's cursor
    pub async fn on_cursor_advanced(
        &self,
        store_id: &StoreId,
        cursor: WriteCursor,
    ) -> Result<IndexEntry, IndexError> {
        let mut entries = self.inner.entries.lock().await;
        let Some(existing) = entries.get(store_id) else {
            tracing::error!(%store_id, cursor = %cursor, "cursor advanced before store start");
            return Err(IndexError::UnknownStore(store_id.clone()));
        };

        let mut entry = existing.clone();
        entry.cur_write_id = Some(cursor);
        self.persist(&entry).await?;
        tracing::debug!(%store_id, cursor = ?entry.cur_write_id, "cursor advanced");
        entries.insert(store_id.clone(), entry.clone());
        self.publish(&entry);
        Ok(entry)
    }

    /// Full current catalog
    pub async fn list(&self) -> Vec<IndexEntry> {
        self.inner.entries.lock().await.values().cloned().collect()
    }

    /// Subscribe: the full catalog first, then every later upsert
    pub async fn watch(&self) -> IndexSubscription {
        let entries = self.inner.entries.lock().await;
        let full = IndexMessage::FullIndex {
            durable_object_list: entries.values().cloned().collect(),
        };
        let (id, rx) = self.inner.subscribers.subscribe(full);
        IndexSubscription {
            id,
            rx,
            subscribers: self.inner.subscribers.clone(),
        }
    }

    /// Drop the entire catalog; object stores are unaffected
    pub async fn reset(&self) -> Result<(), IndexError> {
        let mut entries = self.inner.entries.lock().await;
        self.inner.store.erase_all().await?;
        tracing::warn!(entries = entries.len(), "index reset");
        entries.clear();
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.count()
    }

    async fn persist(&self, entry: &IndexEntry) -> Result<(), IndexError> {
        let value = serde_json::to_value(entry).map_err(IndexError::Encode)?;
        self.inner
            .store
            .apply(vec![Mutation::put(entry_key(&entry.meta.store_id), value)])
            .await?;
        Ok(())
    }

    fn publish(&self, entry: &IndexEntry) {
        self.inner.subscribers.publish(&IndexMessage::PartialIndex {
            durable_object_list: vec![entry.clone()],
        });
    }
}

fn rejected(e: IndexError) -> SinkError {
    SinkError::Rejected {
        class: e.class(),
        message: e.to_string(),
    }
}

#[async_trait]
impl<S: Store> IndexSink for IndexService<S> {
    async fn store_started(
        &self,
        meta: &ObjectMeta,
        cursor: Option<&WriteCursor>,
    ) -> Result<(), SinkError> {
        self.on_started(meta.clone(), cursor.cloned())
            .await
            .map(|_| ())
            .map_err(rejected)
    }

    async fn cursor_advanced(
        &self,
        meta: &ObjectMeta,
        cursor: &WriteCursor,
    ) -> Result<(), SinkError> {
        self.on_cursor_advanced(&meta.store_id, cursor.clone())
            .await
            .map(|_| ())
            .map_err(rejected)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
