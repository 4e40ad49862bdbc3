// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index subscriber set

use kt_core::IndexMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

/// Sender for index delivery
pub type IndexSender = mpsc::UnboundedSender<IndexMessage>;
/// Receiver for index delivery
pub type IndexReceiver = mpsc::UnboundedReceiver<IndexMessage>;

/// Identifies one open subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Fan-out of index messages to open subscriptions
///
/// Closed receivers are pruned on the next publish.
#[derive(Clone, Default)]
pub struct Subscribers {
    senders: Arc<RwLock<HashMap<SubscriberId, IndexSender>>>,
    next_id: Arc<AtomicU64>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; `initial` is the first message it receives
    pub fn subscribe(&self, initial: IndexMessage) -> (SubscriberId, IndexReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // Cannot fail: rx is alive
        let _ = tx.send(initial);

        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        senders.insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        senders.remove(&id);
    }

    /// Send to every subscriber, dropping those that went away
    pub fn publish(&self, message: &IndexMessage) {
        let closed: Vec<SubscriberId> = {
            let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
            senders
                .iter()
                .filter(|(_, tx)| tx.send(message.clone()).is_err())
                .map(|(id, _)| *id)
                .collect()
        };
        if !closed.is_empty() {
            tracing::debug!(count = closed.len(), "pruning closed index subscribers");
            let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
            for id in closed {
                senders.remove(&id);
            }
        }
    }

    pub fn count(&self) -> usize {
        self.senders.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
