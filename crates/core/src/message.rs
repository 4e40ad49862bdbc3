// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream message schemas
//!
//! A sync stream is `start`, any number of `keys_and_values`, any number of
//! `deleted_keys`, then `end`. An index stream is one `full_index` followed
//! by `partial_index` updates.

use crate::cursor::WriteCursor;
use crate::meta::IndexEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// How a sync stream relates to the reader's cached state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadType {
    /// Full snapshot; the reader replaces its copy
    FromStart,
    /// Keys touched since the reader's cursor
    ChangesOnly,
    /// Nothing to send; `reason` says why
    NoChanges,
}

/// Why a stream carries no changes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoChangesReason {
    /// The store has never recorded a write
    NoWritesYet,
    /// The store moved to a new branch; the reader must drop its copy and
    /// re-request without a cursor
    LogIdMismatch,
    /// The reader's cursor is the store's cursor
    AlreadyCurrent,
}

/// One message of a sync stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncMessage {
    Start {
        read_type: ReadType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<NoChangesReason>,
        /// Data in this stream includes writes up to and including this cursor
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cur_write_id: Option<WriteCursor>,
    },
    KeysAndValues {
        keys_and_values: BTreeMap<String, Value>,
    },
    DeletedKeys {
        deleted_keys: Vec<String>,
    },
    End,
}

impl SyncMessage {
    pub fn is_end(&self) -> bool {
        matches!(self, SyncMessage::End)
    }
}

/// One message of an index subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexMessage {
    FullIndex { durable_object_list: Vec<IndexEntry> },
    PartialIndex { durable_object_list: Vec<IndexEntry> },
}

/// Errors in a reader's sync request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("from_log_id and from_write_id must be given together")]
    PartialCursor,
}

/// A reader's sync request, in query-parameter form
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_log_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_write_id: Option<u64>,
}

impl SyncRequest {
    /// Request a full snapshot
    pub fn from_start() -> Self {
        Self::default()
    }

    /// Request changes after a cursor the reader already holds
    pub fn since(cursor: &WriteCursor) -> Self {
        Self {
            from_log_id: Some(cursor.log_id.clone()),
            from_write_id: Some(cursor.write_id),
        }
    }

    /// The reader's cursor, if it supplied one
    pub fn cursor(&self) -> Result<Option<WriteCursor>, RequestError> {
        match (&self.from_log_id, self.from_write_id) {
            (Some(log_id), Some(write_id)) => Ok(Some(WriteCursor::new(log_id.clone(), write_id))),
            (None, None) => Ok(None),
            _ => Err(RequestError::PartialCursor),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
