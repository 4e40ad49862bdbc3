// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object identity and index entries

use crate::cursor::WriteCursor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one object store
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an object store, recorded on first activation
///
/// `logical_name` is unset when the store was only ever addressed by raw id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub store_id: StoreId,
    pub store_kind: String,
    #[serde(default)]
    pub logical_name: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl ObjectMeta {
    /// Overlay `newer` onto `self`: set fields win, unset fields never erase
    pub fn merge(&mut self, newer: ObjectMeta) {
        self.store_kind = newer.store_kind;
        self.started_at = newer.started_at;
        if newer.logical_name.is_some() {
            self.logical_name = newer.logical_name;
        }
    }
}

/// One row of the global index: who a store is and roughly where its log is
///
/// The cursor is a follower copy and may lag the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub meta: ObjectMeta,
    #[serde(default)]
    pub cur_write_id: Option<WriteCursor>,
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
