// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::sink::{FakeIndexSink, SinkCall};
use kt_core::StoreId;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::new();
    let logs_clone = logs.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs_clone)
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

fn meta(id: &str) -> ObjectMeta {
    ObjectMeta {
        store_id: StoreId::new(id),
        store_kind: "room".to_string(),
        logical_name: None,
        started_at: chrono::Utc::now(),
    }
}

// =============================================================================
// Precondition validation tests
// =============================================================================

#[tokio::test]
async fn traced_sink_rejects_empty_store_id() {
    let fake = FakeIndexSink::new();
    let traced = TracedIndexSink::new(fake.clone());

    let err = traced
        .cursor_advanced(&meta(""), &WriteCursor::new("log-1", 1))
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::ProtocolViolation);
    assert!(fake.calls().is_empty(), "inner sink must not be called");
}

#[tokio::test]
async fn traced_sink_forwards_to_inner() {
    let fake = FakeIndexSink::new();
    let traced = TracedIndexSink::new(fake.clone());

    traced.store_started(&meta("abc"), None).await.unwrap();
    traced
        .cursor_advanced(&meta("abc"), &WriteCursor::new("log-1", 3))
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[1], SinkCall::CursorAdvanced { cursor, .. } if cursor.write_id == 3));
}

// =============================================================================
// Tracing output verification tests
// =============================================================================

#[test]
fn traced_started_logs_entry_and_completion() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedIndexSink::new(FakeIndexSink::new());
        traced
            .store_started(&meta("store-xyz"), Some(&WriteCursor::new("log-1", 4)))
            .await
    });

    assert!(result.is_ok(), "delivery should succeed: {:?}", result);
    assert!(
        logs.contains("index.store_started"),
        "Should log span name. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("store-xyz"),
        "Should log store id. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("delivered"),
        "Should log completion. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("elapsed_ms"),
        "Should log timing. Logs:\n{}",
        logs
    );
}

#[test]
fn traced_advance_logs_delivery_failure_as_warning() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeIndexSink::new();
        fake.fail_deliveries(true);
        let traced = TracedIndexSink::new(fake);
        traced
            .cursor_advanced(&meta("abc"), &WriteCursor::new("log-1", 1))
            .await
    });

    assert!(result.is_err());
    assert!(
        logs.contains("WARN"),
        "Should log at warn level. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("delivery failed"),
        "Should log failure. Logs:\n{}",
        logs
    );
    assert!(
        logs.contains("log-1@1"),
        "Should log cursor. Logs:\n{}",
        logs
    );
}
