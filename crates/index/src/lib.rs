// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kvtail index service: the catalog of known stores and their cursors

mod service;
mod subscribers;

pub use service::{IndexError, IndexService, IndexSubscription};
pub use subscribers::{IndexReceiver, SubscriberId, Subscribers};
