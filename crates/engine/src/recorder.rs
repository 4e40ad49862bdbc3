// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-log recorder
//!
//! [`LoggingStore`] wraps a plain [`Store`] and turns every application
//! mutation into one atomic batch: the mutation itself, the change record
//! for its write id, and the advanced cursor. The next write id lives in
//! memory so the write path has exactly one suspension point (the apply).
//! This is a best-effort ordering, not a linearizability guarantee: it
//! relies on the store applying a batch atomically.

use crate::branch::BranchManager;
use crate::error::RecordError;
use crate::notifier::NotifierHandle;
use kt_core::keys::{change_record_key, is_reserved, NEXT_WRITE_KEY};
use kt_core::{ChangeRecord, IdGen, NextWrite, WriteCursor};
use kt_storage::{ListOptions, Mutation, Store};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One mutation request against a store
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Put(BTreeMap<String, Value>),
    Delete(Vec<String>),
}

impl Write {
    pub fn put(key: impl Into<String>, value: Value) -> Self {
        Write::Put(BTreeMap::from([(key.into(), value)]))
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Write::Delete(vec![key.into()])
    }

    /// Keys this write touches
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Write::Put(entries) => entries.keys().map(String::as_str).collect(),
            Write::Delete(keys) => keys.iter().map(String::as_str).collect(),
        }
    }

    fn into_mutations(self) -> Vec<Mutation> {
        match self {
            Write::Put(entries) => entries
                .into_iter()
                .map(|(key, value)| Mutation::Put { key, value })
                .collect(),
            Write::Delete(keys) => keys.into_iter().map(|key| Mutation::Delete { key }).collect(),
        }
    }
}

struct WriterState {
    next: NextWrite,
    /// Set when a batch failed; log state can no longer be trusted
    poisoned: bool,
}

/// Store decorator that records a change log for every application write
///
/// Construct with [`LoggingStore::open`]; the cursor is always initialized
/// before the first write can be issued.
pub struct LoggingStore<S, I> {
    inner: Arc<S>,
    branches: BranchManager<I>,
    state: Mutex<WriterState>,
    notifier: NotifierHandle,
}

/// Read the persisted next-write position, if any write has ever been recorded
pub async fn read_next_write<S: Store + ?Sized>(
    store: &S,
) -> Result<Option<NextWrite>, RecordError> {
    match store.get(NEXT_WRITE_KEY).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| RecordError::Decode {
                key: NEXT_WRITE_KEY.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, RecordError> {
    serde_json::to_value(value).map_err(RecordError::Encode)
}

impl<S: Store, I: IdGen> LoggingStore<S, I> {
    /// Load the durable cursor, or mint a first branch if there is none
    ///
    /// A freshly minted branch is held in memory only; it becomes durable
    /// with the first recorded write.
    pub async fn open(
        inner: Arc<S>,
        branches: BranchManager<I>,
        notifier: NotifierHandle,
    ) -> Result<Self, RecordError> {
        let next = match read_next_write(inner.as_ref()).await? {
            Some(next) => {
                tracing::debug!(log_id = %next.log_id, write_id = next.write_id, "loaded cursor");
                next
            }
            None => {
                let next = branches.mint_branch();
                tracing::debug!(log_id = %next.log_id, "minted first branch");
                next
            }
        };
        Ok(Self {
            inner,
            branches,
            state: Mutex::new(WriterState {
                next,
                poisoned: false,
            }),
            notifier,
        })
    }

    /// Last completed write as tracked in memory
    pub async fn cursor(&self) -> WriteCursor {
        self.state.lock().await.next.completed()
    }

    /// Last completed write as persisted; `None` if nothing was ever recorded
    pub async fn durable_cursor(&self) -> Result<Option<WriteCursor>, RecordError> {
        Ok(read_next_write(self.inner.as_ref())
            .await?
            .map(|next| next.completed()))
    }

    /// Apply a write
    ///
    /// Returns the cursor of the recorded write, or `None` for a write to
    /// reserved keys, which bypasses the log.
    pub async fn write(&self, write: Write) -> Result<Option<WriteCursor>, RecordError> {
        let keys: Vec<String> = write.keys().into_iter().map(str::to_string).collect();
        if keys.is_empty() {
            return Err(RecordError::EmptyWrite);
        }

        let reserved = keys.iter().filter(|key| is_reserved(key)).count();
        if reserved == keys.len() {
            // The poison covers every write, logged or not
            if self.state.lock().await.poisoned {
                return Err(RecordError::Poisoned);
            }
            self.inner.apply(write.into_mutations()).await?;
            return Ok(None);
        }
        if let Some(key) = keys.iter().find(|key| is_reserved(key)) {
            return Err(RecordError::MixedBatch { key: key.clone() });
        }

        let mut state = self.state.lock().await;
        if state.poisoned {
            return Err(RecordError::Poisoned);
        }

        let write_id = state.next.write_id;
        let advanced = state.next.advance();
        let record = ChangeRecord::new(write_id, keys);

        let mut batch = write.into_mutations();
        batch.push(Mutation::put(change_record_key(write_id), encode(&record)?));
        batch.push(Mutation::put(NEXT_WRITE_KEY, encode(&advanced)?));

        if let Err(e) = self.inner.apply(batch).await {
            state.poisoned = true;
            tracing::error!(
                log_id = %state.next.log_id,
                write_id,
                error = %e,
                "write failed, recorder stopped"
            );
            return Err(RecordError::Fatal(e));
        }

        state.next = advanced;
        let cursor = state.next.completed();
        tracing::trace!(cursor = %cursor, keys = record.keys.len(), "recorded write");
        // Notify under the lock so notifications leave in write order
        self.notifier.notify(cursor.clone());
        Ok(Some(cursor))
    }

    pub async fn put(&self, key: &str, value: Value) -> Result<Option<WriteCursor>, RecordError> {
        self.write(Write::put(key, value)).await
    }

    pub async fn put_many(
        &self,
        entries: BTreeMap<String, Value>,
    ) -> Result<Option<WriteCursor>, RecordError> {
        self.write(Write::Put(entries)).await
    }

    pub async fn delete(&self, key: &str) -> Result<Option<WriteCursor>, RecordError> {
        self.write(Write::delete(key)).await
    }

    pub async fn delete_many(&self, keys: Vec<String>) -> Result<Option<WriteCursor>, RecordError> {
        self.write(Write::Delete(keys)).await
    }

    /// Erase all storage and move to a new branch
    ///
    /// The new branch is persisted at once so readers holding the old log id
    /// are told to resync even before the next write.
    pub async fn erase_all(&self) -> Result<WriteCursor, RecordError> {
        let mut state = self.state.lock().await;
        if state.poisoned {
            return Err(RecordError::Poisoned);
        }

        if let Err(e) = self.inner.erase_all().await {
            state.poisoned = true;
            tracing::error!(error = %e, "erase failed, recorder stopped");
            return Err(RecordError::Fatal(e));
        }

        let next = self.branches.on_bulk_erase(&state.next);
        let persisted = self
            .inner
            .apply(vec![Mutation::put(NEXT_WRITE_KEY, encode(&next)?)])
            .await;
        if let Err(e) = persisted {
            state.poisoned = true;
            tracing::error!(log_id = %next.log_id, error = %e, "erase failed, recorder stopped");
            return Err(RecordError::Fatal(e));
        }

        state.next = next;
        let cursor = state.next.completed();
        self.notifier.notify(cursor.clone());
        Ok(cursor)
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, RecordError> {
        Ok(self.inner.get(key).await?)
    }

    pub async fn get_many(&self, keys: &[String]) -> Result<BTreeMap<String, Value>, RecordError> {
        Ok(self.inner.get_many(keys).await?)
    }

    pub async fn list(&self, options: &ListOptions) -> Result<BTreeMap<String, Value>, RecordError> {
        Ok(self.inner.list(options).await?)
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
