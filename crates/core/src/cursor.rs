// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write cursors and change records
//!
//! A store keeps two views of the same position. [`NextWrite`] is what the
//! recorder holds in memory and persists: the id the *next* write will get.
//! [`WriteCursor`] is what readers see: the last *completed* write. The two
//! differ by exactly one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Point in a store's write history: `(log_id, write_id)`
///
/// `write_id` is the last completed write on the branch named by `log_id`.
/// Zero means the branch exists but nothing has been written on it yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteCursor {
    pub log_id: String,
    pub write_id: u64,
}

impl WriteCursor {
    pub fn new(log_id: impl Into<String>, write_id: u64) -> Self {
        Self {
            log_id: log_id.into(),
            write_id,
        }
    }

    /// True if both cursors name the same branch
    pub fn same_branch(&self, other: &WriteCursor) -> bool {
        self.log_id == other.log_id
    }
}

impl fmt::Display for WriteCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.log_id, self.write_id)
    }
}

/// The id the next recorded write will be assigned
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextWrite {
    pub log_id: String,
    pub write_id: u64,
}

impl NextWrite {
    /// Start of a fresh branch: the first write gets id 1
    pub fn start_of(log_id: impl Into<String>) -> Self {
        Self {
            log_id: log_id.into(),
            write_id: 1,
        }
    }

    /// The next position after this write completes
    pub fn advance(&self) -> Self {
        Self {
            log_id: self.log_id.clone(),
            write_id: self.write_id + 1,
        }
    }

    /// Last completed write
    pub fn completed(&self) -> WriteCursor {
        WriteCursor {
            log_id: self.log_id.clone(),
            write_id: self.write_id.saturating_sub(1),
        }
    }
}

/// Keys touched by one completed write
///
/// Immutable once persisted. Keys are kept sorted and unique so that two
/// records describing the same key set serialize identically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub write_id: u64,
    pub keys: Vec<String>,
}

impl ChangeRecord {
    pub fn new(write_id: u64, keys: impl IntoIterator<Item = String>) -> Self {
        let keys: BTreeSet<String> = keys.into_iter().collect();
        Self {
            write_id,
            keys: keys.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
