// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coalesced cursor notifications
//!
//! [`Coalescer`] is the pure rate-limiting state machine. [`ChangeNotifier`]
//! drives it from a tokio task and delivers to an [`IndexSink`].

use kt_adapters::IndexSink;
use kt_core::{ObjectMeta, WriteCursor};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Object meta shared between a store object and its notifier
///
/// A name learned after activation is visible to later notifications.
pub type SharedMeta = Arc<RwLock<ObjectMeta>>;

/// Copy of the current meta
pub fn read_meta(meta: &SharedMeta) -> ObjectMeta {
    meta.read().unwrap_or_else(|e| e.into_inner()).clone()
}

#[derive(Debug)]
enum CoalesceState<T> {
    Idle,
    /// Something was sent at the start of this window
    Pending { window_end: Instant },
    /// As `Pending`, and a newer value arrived during the window
    PendingNewer { window_end: Instant, latest: T },
}

/// Leading- and trailing-edge coalescing of values over a fixed window
///
/// At most one value leaves per window. A trigger while idle is sent at
/// once; triggers inside the window only replace the pending value, which is
/// sent when the window closes.
#[derive(Debug)]
pub struct Coalescer<T> {
    interval: Duration,
    state: CoalesceState<T>,
}

impl<T> Coalescer<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: CoalesceState::Idle,
        }
    }

    /// Record a new value; returns it if it should be sent now
    pub fn trigger(&mut self, now: Instant, value: T) -> Option<T> {
        match std::mem::replace(&mut self.state, CoalesceState::Idle) {
            CoalesceState::Pending { window_end }
            | CoalesceState::PendingNewer { window_end, .. }
                if now < window_end =>
            {
                self.state = CoalesceState::PendingNewer {
                    window_end,
                    latest: value,
                };
                None
            }
            // Idle, or a window that closed without being polled
            _ => {
                self.state = CoalesceState::Pending {
                    window_end: now + self.interval,
                };
                Some(value)
            }
        }
    }

    /// Close the window if it has ended; returns the trailing value to send
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match std::mem::replace(&mut self.state, CoalesceState::Idle) {
            CoalesceState::Pending { window_end } if now >= window_end => None,
            CoalesceState::PendingNewer { window_end, latest } if now >= window_end => {
                // The trailing send opens a window of its own
                self.state = CoalesceState::Pending {
                    window_end: now + self.interval,
                };
                Some(latest)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// When `poll` next needs to run, if ever
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            CoalesceState::Idle => None,
            CoalesceState::Pending { window_end }
            | CoalesceState::PendingNewer { window_end, .. } => Some(*window_end),
        }
    }

    /// Drain the pending value regardless of the window
    pub fn flush(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, CoalesceState::Idle) {
            CoalesceState::PendingNewer { latest, .. } => Some(latest),
            CoalesceState::Idle | CoalesceState::Pending { .. } => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, CoalesceState::Idle)
    }
}

/// Sender half held by the recorder
///
/// Sending never blocks and never fails the write that triggered it.
#[derive(Clone, Debug)]
pub struct NotifierHandle {
    tx: Option<mpsc::UnboundedSender<WriteCursor>>,
}

impl NotifierHandle {
    /// A handle that drops every notification
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, cursor: WriteCursor) {
        if let Some(tx) = &self.tx {
            if tx.send(cursor).is_err() {
                tracing::debug!("change notifier stopped, dropping cursor");
            }
        }
    }
}

/// Per-store notifier task
pub struct ChangeNotifier;

impl ChangeNotifier {
    /// Spawn the task; it runs until every handle is dropped, then flushes
    pub fn spawn<K: IndexSink>(meta: SharedMeta, sink: K, interval: Duration) -> NotifierHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, meta, sink, Coalescer::new(interval)));
        NotifierHandle { tx: Some(tx) }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn run<K: IndexSink>(
    mut rx: mpsc::UnboundedReceiver<WriteCursor>,
    meta: SharedMeta,
    sink: K,
    mut coalescer: Coalescer<WriteCursor>,
) {
    loop {
        let deadline = coalescer.deadline();
        let window_closed = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at.into()).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            received = rx.recv() => match received {
                Some(cursor) => {
                    if let Some(cursor) = coalescer.trigger(now(), cursor) {
                        deliver(&sink, &meta, &cursor).await;
                    }
                }
                None => {
                    if let Some(cursor) = coalescer.flush() {
                        deliver(&sink, &meta, &cursor).await;
                    }
                    break;
                }
            },
            _ = window_closed => {
                if let Some(cursor) = coalescer.poll(now()) {
                    deliver(&sink, &meta, &cursor).await;
                }
            }
        }
    }
    tracing::debug!(store_id = %read_meta(&meta).store_id, "change notifier exiting");
}

async fn deliver<K: IndexSink>(sink: &K, meta: &SharedMeta, cursor: &WriteCursor) {
    let meta = read_meta(meta);
    // Best effort: the next write produces a newer cursor anyway
    if let Err(e) = sink.cursor_advanced(&meta, cursor).await {
        tracing::warn!(
            store_id = %meta.store_id,
            cursor = %cursor,
            class = %e.class(),
            error = %e,
            "cursor notification dropped"
        );
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
