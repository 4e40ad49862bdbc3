// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake index sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{IndexSink, SinkError};
use async_trait::async_trait;
use kt_core::{ObjectMeta, WriteCursor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Recorded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Started {
        meta: ObjectMeta,
        cursor: Option<WriteCursor>,
    },
    CursorAdvanced {
        meta: ObjectMeta,
        cursor: WriteCursor,
    },
}

/// Fake sink that records every delivered notification
#[derive(Clone, Default)]
pub struct FakeIndexSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    fail: Arc<AtomicBool>,
}

impl FakeIndexSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail as if the index were unreachable
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Get all recorded notifications
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Cursors of the recorded "cursor advanced" notifications, in order
    pub fn advanced_cursors(&self) -> Vec<WriteCursor> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::CursorAdvanced { cursor, .. } => Some(cursor),
                SinkCall::Started { .. } => None,
            })
            .collect()
    }

    fn record(&self, call: SinkCall) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Unreachable("fake sink failing".to_string()));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl IndexSink for FakeIndexSink {
    async fn store_started(
        &self,
        meta: &ObjectMeta,
        cursor: Option<&WriteCursor>,
    ) -> Result<(), SinkError> {
        self.record(SinkCall::Started {
            meta: meta.clone(),
            cursor: cursor.cloned(),
        })
    }

    async fn cursor_advanced(
        &self,
        meta: &ObjectMeta,
        cursor: &WriteCursor,
    ) -> Result<(), SinkError> {
        self.record(SinkCall::CursorAdvanced {
            meta: meta.clone(),
            cursor: cursor.clone(),
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
