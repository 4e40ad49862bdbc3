// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery of store notifications to the index

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeIndexSink, SinkCall};

use async_trait::async_trait;
use kt_core::{ErrorClass, ObjectMeta, WriteCursor};
use thiserror::Error;

/// Errors from delivering a notification
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("index unreachable: {0}")]
    Unreachable(String),
    #[error("index rejected notification: {message}")]
    Rejected { class: ErrorClass, message: String },
}

impl SinkError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SinkError::Unreachable(_) => ErrorClass::BestEffortDelivery,
            SinkError::Rejected { class, .. } => *class,
        }
    }
}

/// Receiver of "store started" and "cursor advanced" notifications
#[async_trait]
pub trait IndexSink: Clone + Send + Sync + 'static {
    /// A store was activated; `cursor` is its last completed write, if any
    async fn store_started(
        &self,
        meta: &ObjectMeta,
        cursor: Option<&WriteCursor>,
    ) -> Result<(), SinkError>;

    /// A store's cursor moved forward (or onto a new branch)
    async fn cursor_advanced(&self, meta: &ObjectMeta, cursor: &WriteCursor)
        -> Result<(), SinkError>;
}
