// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync protocol handler
//!
//! Serves a reader's request as `start`, chunked `keys_and_values`, chunked
//! `deleted_keys` (changes only), then `end`. All reads are side-effect
//! free; a `from_start` snapshot is paged and is not atomic across pages.

use crate::error::RecordError;
use crate::recorder::read_next_write;
use kt_core::keys::{change_record_key, is_reserved};
use kt_core::{
    ChangeRecord, ErrorClass, NoChangesReason, ReadType, RequestError, SyncMessage, SyncRequest,
    WriteCursor,
};
use kt_storage::{ListOptions, Store, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that end a single sync attempt
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("reader cursor {requested} is ahead of store cursor {current}")]
    AheadOfSource {
        requested: WriteCursor,
        current: WriteCursor,
    },
    #[error("change record {write_id} lists reserved key {key}")]
    ReservedKeyInRecord { write_id: u64, key: String },
    #[error("change record {write_id} is missing from the log")]
    MissingRecord { write_id: u64 },
    #[error("undecodable {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("reader went away")]
    ChannelClosed,
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::InvalidRequest(_)
            | SyncError::AheadOfSource { .. }
            | SyncError::ReservedKeyInRecord { .. } => ErrorClass::ProtocolViolation,
            SyncError::MissingRecord { .. } | SyncError::Decode { .. } => ErrorClass::LogCorruption,
            SyncError::Store(_) => ErrorClass::Storage,
            SyncError::ChannelClosed => ErrorClass::BestEffortDelivery,
        }
    }
}

impl From<RecordError> for SyncError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Decode { key, source } => SyncError::Decode { key, source },
            RecordError::Store(e) | RecordError::Fatal(e) => SyncError::Store(e),
            other => SyncError::Store(StoreError::Unavailable(other.to_string())),
        }
    }
}

/// What a request resolves to, before anything is streamed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncPlan {
    NoChanges {
        reason: NoChangesReason,
        cursor: Option<WriteCursor>,
    },
    /// `cursor` is `None` when the store was never written
    FromStart { cursor: Option<WriteCursor> },
    ChangesOnly {
        cursor: WriteCursor,
        keys: BTreeSet<String>,
    },
}

impl SyncPlan {
    pub fn read_type(&self) -> ReadType {
        match self {
            SyncPlan::NoChanges { .. } => ReadType::NoChanges,
            SyncPlan::FromStart { .. } => ReadType::FromStart,
            SyncPlan::ChangesOnly { .. } => ReadType::ChangesOnly,
        }
    }

    fn start_message(&self) -> SyncMessage {
        let (reason, cursor) = match self {
            SyncPlan::NoChanges { reason, cursor } => (Some(*reason), cursor.clone()),
            SyncPlan::FromStart { cursor } => (None, cursor.clone()),
            SyncPlan::ChangesOnly { cursor, .. } => (None, Some(cursor.clone())),
        };
        SyncMessage::Start {
            read_type: self.read_type(),
            reason,
            cur_write_id: cursor,
        }
    }
}

/// Serves sync requests for one store
pub struct SyncHandler<S> {
    store: Arc<S>,
    chunk_size: usize,
}

impl<S: Store> SyncHandler<S> {
    pub fn new(store: Arc<S>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Resolve a request against the store's durable cursor
    pub async fn plan(&self, request: &SyncRequest) -> Result<SyncPlan, SyncError> {
        let requested = request.cursor()?;
        let current = read_next_write(self.store.as_ref())
            .await?
            .map(|next| next.completed());

        let (requested, current) = match (requested, current) {
            (None, cursor) => return Ok(SyncPlan::FromStart { cursor }),
            (Some(_), None) => {
                return Ok(SyncPlan::NoChanges {
                    reason: NoChangesReason::NoWritesYet,
                    cursor: None,
                })
            }
            (Some(requested), Some(current)) => (requested, current),
        };

        if !requested.same_branch(&current) {
            return Ok(SyncPlan::NoChanges {
                reason: NoChangesReason::LogIdMismatch,
                cursor: Some(current),
            });
        }
        if requested.write_id > current.write_id {
            return Err(SyncError::AheadOfSource { requested, current });
        }
        if requested.write_id == current.write_id {
            return Ok(SyncPlan::NoChanges {
                reason: NoChangesReason::AlreadyCurrent,
                cursor: Some(current),
            });
        }

        let keys = self
            .touched_keys(requested.write_id + 1, current.write_id)
            .await?;
        Ok(SyncPlan::ChangesOnly {
            cursor: current,
            keys,
        })
    }

    /// Union of the keys in change records `first..=last`
    async fn touched_keys(&self, first: u64, last: u64) -> Result<BTreeSet<String>, SyncError> {
        let mut keys = BTreeSet::new();
        let mut write_id = first;
        while write_id <= last {
            let batch_end = last.min(write_id.saturating_add(self.chunk_size as u64 - 1));
            let record_keys: Vec<String> = (write_id..=batch_end).map(change_record_key).collect();
            let mut records = self.store.get_many(&record_keys).await?;

            for (id, record_key) in (write_id..=batch_end).zip(record_keys) {
                let value = records
                    .remove(&record_key)
                    .ok_or(SyncError::MissingRecord { write_id: id })?;
                let record: ChangeRecord =
                    serde_json::from_value(value).map_err(|source| SyncError::Decode {
                        key: record_key.clone(),
                        source,
                    })?;
                for key in record.keys {
                    if is_reserved(&key) {
                        return Err(SyncError::ReservedKeyInRecord { write_id: id, key });
                    }
                    keys.insert(key);
                }
            }
            write_id = batch_end + 1;
        }
        Ok(keys)
    }

    /// Stream the response to `tx`, ending with `end`
    ///
    /// Stops with [`SyncError::ChannelClosed`] as soon as the reader is gone.
    pub async fn serve(
        &self,
        request: &SyncRequest,
        tx: &mpsc::Sender<SyncMessage>,
    ) -> Result<ReadType, SyncError> {
        let plan = self.plan(request).await?;
        let read_type = plan.read_type();
        tracing::debug!(?read_type, "serving sync");
        send(tx, plan.start_message()).await?;

        match plan {
            SyncPlan::NoChanges { .. } => {}
            SyncPlan::FromStart { .. } => self.send_snapshot(tx).await?,
            SyncPlan::ChangesOnly { keys, .. } => self.send_changes(tx, keys).await?,
        }

        send(tx, SyncMessage::End).await?;
        Ok(read_type)
    }

    async fn send_snapshot(&self, tx: &mpsc::Sender<SyncMessage>) -> Result<(), SyncError> {
        let mut start_after: Option<String> = None;
        loop {
            let mut options = ListOptions::new().with_limit(self.chunk_size);
            if let Some(key) = &start_after {
                options = options.with_start_after(key.clone());
            }
            let page = self.store.list(&options).await?;
            let Some(last) = page.keys().next_back().cloned() else {
                return Ok(());
            };

            let chunk: BTreeMap<_, _> = page
                .into_iter()
                .filter(|(key, _)| !is_reserved(key))
                .collect();
            if !chunk.is_empty() {
                send(
                    tx,
                    SyncMessage::KeysAndValues {
                        keys_and_values: chunk,
                    },
                )
                .await?;
            }
            start_after = Some(last);
        }
    }

    async fn send_changes(
        &self,
        tx: &mpsc::Sender<SyncMessage>,
        keys: BTreeSet<String>,
    ) -> Result<(), SyncError> {
        let keys: Vec<String> = keys.into_iter().collect();
        let mut deleted = Vec::new();

        for chunk in keys.chunks(self.chunk_size) {
            let found = self.store.get_many(chunk).await?;
            deleted.extend(chunk.iter().filter(|key| !found.contains_key(*key)).cloned());
            if !found.is_empty() {
                send(
                    tx,
                    SyncMessage::KeysAndValues {
                        keys_and_values: found,
                    },
                )
                .await?;
            }
        }

        for chunk in deleted.chunks(self.chunk_size) {
            send(
                tx,
                SyncMessage::DeletedKeys {
                    deleted_keys: chunk.to_vec(),
                },
            )
            .await?;
        }
        Ok(())
    }
}

async fn send(tx: &mpsc::Sender<SyncMessage>, message: SyncMessage) -> Result<(), SyncError> {
    tx.send(message).await.map_err(|_| SyncError::ChannelClosed)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
