// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activated object store

use crate::branch::BranchManager;
use crate::error::{EngineError, RecordError};
use crate::notifier::{read_meta, ChangeNotifier, SharedMeta};
use crate::recorder::{LoggingStore, Write};
use crate::sync::{SyncError, SyncHandler};
use kt_adapters::IndexSink;
use kt_core::keys::{is_reserved, META_KEY};
use kt_core::{
    Clock, IdGen, ObjectMeta, ReadType, ReplicationConfig, StoreId, SyncMessage, SyncRequest,
    WriteCursor,
};
use kt_storage::{ListOptions, Store};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::Instrument;

/// Identity a store is activated under
#[derive(Clone, Debug)]
pub struct Activation {
    pub id: StoreId,
    pub kind: String,
    pub name: Option<String>,
}

/// One live object store: recorder, sync handler and its index identity
pub struct StoreObject<S, I> {
    meta: SharedMeta,
    recorder: LoggingStore<S, I>,
    sync: SyncHandler<S>,
}

impl<S: Store, I: IdGen> StoreObject<S, I> {
    /// Attach the write log to `store` and announce it to the index
    pub async fn activate<K: IndexSink, C: Clock>(
        store: S,
        activation: Activation,
        sink: K,
        ids: I,
        config: &ReplicationConfig,
        clock: &C,
    ) -> Result<Self, EngineError> {
        let span = tracing::info_span!("store.activate", id = %activation.id, kind = %activation.kind);
        Self::activate_inner(store, activation, sink, ids, config, clock)
            .instrument(span)
            .await
    }

    async fn activate_inner<K: IndexSink, C: Clock>(
        store: S,
        activation: Activation,
        sink: K,
        ids: I,
        config: &ReplicationConfig,
        clock: &C,
    ) -> Result<Self, EngineError> {
        let store = Arc::new(store);
        let stored = match store.get(META_KEY).await? {
            Some(value) => Some(serde_json::from_value::<ObjectMeta>(value).map_err(|source| {
                RecordError::Decode {
                    key: META_KEY.to_string(),
                    source,
                }
            })?),
            None => None,
        };

        let first_activation = stored.is_none();
        let mut meta = stored.unwrap_or_else(|| ObjectMeta {
            store_id: activation.id.clone(),
            store_kind: activation.kind.clone(),
            logical_name: None,
            started_at: clock.utc_now(),
        });
        // A raw-id activation never erases a stored name
        let named_now = meta.logical_name.is_none() && activation.name.is_some();
        if named_now {
            meta.logical_name = activation.name.clone();
        }

        let shared = Arc::new(RwLock::new(meta.clone()));
        let notifier = ChangeNotifier::spawn(Arc::clone(&shared), sink.clone(), config.notify_interval);
        let recorder = LoggingStore::open(Arc::clone(&store), BranchManager::new(ids), notifier)
            .await?;
        if first_activation || named_now {
            recorder.write(meta_write(&meta)?).await?;
        }

        let cursor = recorder.durable_cursor().await?;
        sink.store_started(&meta, cursor.as_ref())
            .await
            .map_err(EngineError::Started)?;
        tracing::info!(
            name = ?meta.logical_name,
            cursor = ?cursor.as_ref().map(ToString::to_string),
            first_activation,
            "store active"
        );

        Ok(Self {
            meta: shared,
            sync: SyncHandler::new(store, config.chunk_size),
            recorder,
        })
    }

    pub fn meta(&self) -> ObjectMeta {
        read_meta(&self.meta)
    }

    /// Record a logical name for a store first reached by raw id
    ///
    /// A no-op once the store has a name. Otherwise the name is persisted
    /// and the store is announced again so the index learns it.
    pub async fn learn_name<K: IndexSink>(&self, name: &str, sink: &K) -> Result<(), EngineError> {
        let mut meta = self.meta();
        if meta.logical_name.is_some() {
            return Ok(());
        }
        meta.logical_name = Some(name.to_string());
        self.recorder.write(meta_write(&meta)?).await?;
        *self.meta.write().unwrap_or_else(|e| e.into_inner()) = meta.clone();

        let cursor = self.recorder.durable_cursor().await?;
        sink.store_started(&meta, cursor.as_ref())
            .await
            .map_err(EngineError::Started)?;
        tracing::info!(id = %meta.store_id, name = %name, "store name learned");
        Ok(())
    }

    pub async fn cursor(&self) -> Result<Option<WriteCursor>, EngineError> {
        Ok(self.recorder.durable_cursor().await?)
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, EngineError> {
        reject_reserved([key])?;
        Ok(self.recorder.get(key).await?)
    }

    pub async fn get_many(&self, keys: &[String]) -> Result<BTreeMap<String, Value>, EngineError> {
        reject_reserved(keys)?;
        Ok(self.recorder.get_many(keys).await?)
    }

    /// Application keys only
    pub async fn list(&self, options: &ListOptions) -> Result<BTreeMap<String, Value>, EngineError> {
        let mut entries = self.recorder.list(options).await?;
        entries.retain(|key, _| !is_reserved(key));
        Ok(entries)
    }

    pub async fn put(&self, key: &str, value: Value) -> Result<Option<WriteCursor>, EngineError> {
        reject_reserved([key])?;
        Ok(self.recorder.put(key, value).await?)
    }

    pub async fn put_many(
        &self,
        entries: BTreeMap<String, Value>,
    ) -> Result<Option<WriteCursor>, EngineError> {
        reject_reserved(entries.keys())?;
        Ok(self.recorder.put_many(entries).await?)
    }

    pub async fn delete(&self, key: &str) -> Result<Option<WriteCursor>, EngineError> {
        reject_reserved([key])?;
        Ok(self.recorder.delete(key).await?)
    }

    pub async fn delete_many(&self, keys: Vec<String>) -> Result<Option<WriteCursor>, EngineError> {
        reject_reserved(&keys)?;
        Ok(self.recorder.delete_many(keys).await?)
    }

    /// Erase everything and start a new branch; the store keeps its identity
    pub async fn erase_all(&self) -> Result<WriteCursor, EngineError> {
        let meta = self.meta();
        let cursor = self.recorder.erase_all().await?;
        self.recorder.write(meta_write(&meta)?).await?;
        tracing::info!(id = %meta.store_id, cursor = %cursor, "store erased");
        Ok(cursor)
    }

    /// Serve one sync request to `tx`
    pub async fn read_all_from(
        &self,
        request: &SyncRequest,
        tx: &mpsc::Sender<SyncMessage>,
    ) -> Result<ReadType, SyncError> {
        let result = self.sync.serve(request, tx).await;
        if let Err(e) = &result {
            tracing::warn!(
                id = %self.meta().store_id,
                class = %e.class(),
                error = %e,
                "sync aborted"
            );
        }
        result
    }
}

/// Reserved keys are written only by the engine itself
fn reject_reserved<K: AsRef<str>>(keys: impl IntoIterator<Item = K>) -> Result<(), EngineError> {
    match keys.into_iter().find(|key| is_reserved(key.as_ref())) {
        Some(key) => Err(EngineError::ReservedKey {
            key: key.as_ref().to_string(),
        }),
        None => Ok(()),
    }
}

fn meta_write(meta: &ObjectMeta) -> Result<Write, RecordError> {
    let value = serde_json::to_value(meta).map_err(RecordError::Encode)?;
    Ok(Write::put(META_KEY, value))
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod tests;
