// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kt_adapters::FakeIndexSink;
use kt_core::{Clock, StoreId, SystemClock};

const WINDOW: Duration = Duration::from_secs(1);

// =============================================================================
// Coalescer state machine
// =============================================================================

#[test]
fn first_trigger_is_sent_immediately() {
    let mut coalescer = Coalescer::new(WINDOW);
    let now = Instant::now();

    assert_eq!(coalescer.trigger(now, 1), Some(1));
    assert_eq!(coalescer.deadline(), Some(now + WINDOW));
}

#[test]
fn burst_sends_leading_and_latest_trailing() {
    let mut coalescer = Coalescer::new(WINDOW);
    let now = Instant::now();

    assert_eq!(coalescer.trigger(now, 1), Some(1));
    assert_eq!(coalescer.trigger(now + Duration::from_millis(100), 2), None);
    assert_eq!(coalescer.trigger(now + Duration::from_millis(200), 3), None);

    // Window still open
    assert_eq!(coalescer.poll(now + Duration::from_millis(500)), None);

    // Trailing edge carries only the newest value
    assert_eq!(coalescer.poll(now + WINDOW), Some(3));
    assert!(!coalescer.is_idle(), "trailing send opens a new window");
}

#[test]
fn quiet_window_returns_to_idle() {
    let mut coalescer = Coalescer::new(WINDOW);
    let now = Instant::now();

    coalescer.trigger(now, 1);
    assert_eq!(coalescer.poll(now + WINDOW), None);
    assert!(coalescer.is_idle());
    assert_eq!(coalescer.deadline(), None);
}

#[test]
fn at_most_one_send_per_window() {
    let mut coalescer = Coalescer::new(WINDOW);
    let start = Instant::now();
    let mut sent = Vec::new();

    // One trigger every 100ms for 3 seconds, polling on every tick
    for tick in 0..30u32 {
        let now = start + Duration::from_millis(100) * tick;
        if let Some(v) = coalescer.poll(now) {
            sent.push((now, v));
        }
        if let Some(v) = coalescer.trigger(now, tick) {
            sent.push((now, v));
        }
    }

    for pair in sent.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= WINDOW, "sends too close: {:?}", pair);
    }
    assert!(sent.len() >= 3);
}

#[test]
fn trigger_after_unpolled_window_is_leading_edge() {
    let mut coalescer = Coalescer::new(WINDOW);
    let now = Instant::now();

    coalescer.trigger(now, 1);
    coalescer.trigger(now + Duration::from_millis(10), 2);
    // Window elapsed without a poll; the new value supersedes the pending one
    assert_eq!(coalescer.trigger(now + WINDOW * 2, 3), Some(3));
    assert_eq!(coalescer.flush(), None);
}

#[test]
fn flush_drains_pending_value() {
    let mut coalescer = Coalescer::new(WINDOW);
    let now = Instant::now();

    coalescer.trigger(now, 1);
    coalescer.trigger(now, 2);
    assert_eq!(coalescer.flush(), Some(2));
    assert!(coalescer.is_idle());
}

// =============================================================================
// Notifier task
// =============================================================================

fn meta() -> SharedMeta {
    Arc::new(RwLock::new(ObjectMeta {
        store_id: StoreId::new("abc"),
        store_kind: "default".to_string(),
        logical_name: None,
        started_at: SystemClock.utc_now(),
    }))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn notifier_delivers_leading_then_trailing() {
    let sink = FakeIndexSink::new();
    let handle = ChangeNotifier::spawn(meta(), sink.clone(), WINDOW);

    handle.notify(WriteCursor::new("log-1", 1));
    handle.notify(WriteCursor::new("log-1", 2));
    handle.notify(WriteCursor::new("log-1", 3));
    settle().await;
    assert_eq!(sink.advanced_cursors(), vec![WriteCursor::new("log-1", 1)]);

    tokio::time::sleep(WINDOW).await;
    assert_eq!(
        sink.advanced_cursors(),
        vec![WriteCursor::new("log-1", 1), WriteCursor::new("log-1", 3)]
    );
}

#[tokio::test(start_paused = true)]
async fn notifier_flushes_pending_on_close() {
    let sink = FakeIndexSink::new();
    let handle = ChangeNotifier::spawn(meta(), sink.clone(), WINDOW);

    handle.notify(WriteCursor::new("log-1", 1));
    handle.notify(WriteCursor::new("log-1", 2));
    settle().await;
    drop(handle);
    settle().await;

    assert_eq!(
        sink.advanced_cursors(),
        vec![WriteCursor::new("log-1", 1), WriteCursor::new("log-1", 2)]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_does_not_stop_notifier() {
    let sink = FakeIndexSink::new();
    let handle = ChangeNotifier::spawn(meta(), sink.clone(), WINDOW);

    sink.fail_deliveries(true);
    handle.notify(WriteCursor::new("log-1", 1));
    settle().await;
    assert!(sink.calls().is_empty());

    sink.fail_deliveries(false);
    tokio::time::sleep(WINDOW).await;
    handle.notify(WriteCursor::new("log-1", 2));
    settle().await;
    assert_eq!(sink.advanced_cursors(), vec![WriteCursor::new("log-1", 2)]);
}

#[tokio::test(start_paused = true)]
async fn notifications_carry_a_name_learned_later() {
    use kt_adapters::SinkCall;

    let sink = FakeIndexSink::new();
    let shared = meta();
    let handle = ChangeNotifier::spawn(Arc::clone(&shared), sink.clone(), WINDOW);

    handle.notify(WriteCursor::new("log-1", 1));
    settle().await;
    shared.write().unwrap().logical_name = Some("lobby".to_string());
    tokio::time::sleep(WINDOW).await;
    handle.notify(WriteCursor::new("log-1", 2));
    settle().await;

    let names: Vec<_> = sink
        .calls()
        .into_iter()
        .map(|call| match call {
            SinkCall::CursorAdvanced { meta, .. } => meta.logical_name,
            other => panic!("unexpected call: {:?}", other),
        })
        .collect();
    assert_eq!(names, vec![None, Some("lobby".to_string())]);
}

#[test]
fn detached_handle_drops_silently() {
    let handle = NotifierHandle::detached();
    handle.notify(WriteCursor::new("log-1", 1));
}
