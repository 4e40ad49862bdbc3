// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Branch manager
//!
//! A branch is one contiguous history under a single log id. Changing the
//! log id is the only way a reader's cursor becomes permanently invalid.

use kt_core::{IdGen, NextWrite};

/// Mints log ids for a store's branches
#[derive(Clone, Debug)]
pub struct BranchManager<I> {
    ids: I,
}

impl<I: IdGen> BranchManager<I> {
    pub fn new(ids: I) -> Self {
        Self { ids }
    }

    /// Start a fresh branch; the first write on it gets id 1
    pub fn mint_branch(&self) -> NextWrite {
        NextWrite::start_of(self.ids.next())
    }

    /// Start the branch that follows a storage-wide erase
    ///
    /// The new log id always differs from `previous`, even if the id
    /// generator repeats itself.
    pub fn on_bulk_erase(&self, previous: &NextWrite) -> NextWrite {
        let mut next = self.mint_branch();
        if next.log_id == previous.log_id {
            tracing::warn!(log_id = %previous.log_id, "id generator repeated a log id");
            next.log_id = format!("{}.{}", previous.log_id, previous.write_id);
        }
        tracing::info!(from = %previous.log_id, to = %next.log_id, "new branch after erase");
        next
    }
}
