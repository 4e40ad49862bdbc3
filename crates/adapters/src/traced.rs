// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced sink wrapper for consistent observability

use crate::sink::{IndexSink, SinkError};
use async_trait::async_trait;
use kt_core::{ErrorClass, ObjectMeta, WriteCursor};
use tracing::Instrument;

/// Wrapper that adds tracing to any IndexSink
#[derive(Clone)]
pub struct TracedIndexSink<S> {
    inner: S,
}

impl<S> TracedIndexSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

fn check_meta(meta: &ObjectMeta) -> Result<(), SinkError> {
    if meta.store_id.as_str().is_empty() {
        tracing::error!("notification without a store id");
        return Err(SinkError::Rejected {
            class: ErrorClass::ProtocolViolation,
            message: "store id must not be empty".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl<S: IndexSink> IndexSink for TracedIndexSink<S> {
    async fn store_started(
        &self,
        meta: &ObjectMeta,
        cursor: Option<&WriteCursor>,
    ) -> Result<(), SinkError> {
        let span = tracing::info_span!(
            "index.store_started",
            store_id = %meta.store_id,
            kind = %meta.store_kind,
        );
        async {
            tracing::info!(cursor = ?cursor.map(ToString::to_string), "delivering");
            check_meta(meta)?;

            let start = std::time::Instant::now();
            let result = self.inner.store_started(meta, cursor).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "delivered"),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "delivery failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn cursor_advanced(
        &self,
        meta: &ObjectMeta,
        cursor: &WriteCursor,
    ) -> Result<(), SinkError> {
        let span = tracing::info_span!(
            "index.cursor_advanced",
            store_id = %meta.store_id,
            cursor = %cursor,
        );
        async {
            check_meta(meta)?;

            let start = std::time::Instant::now();
            let result = self.inner.cursor_advanced(meta, cursor).await;
            let elapsed = start.elapsed();

            // Advances are best effort; a later advance supersedes this one
            match &result {
                Ok(()) => tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "delivered"),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "delivery failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
