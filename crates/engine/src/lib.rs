// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kvtail replication engine
//!
//! Per-store write-log recording, branch management, sync serving and
//! coalesced index notification, plus the namespaces that activate stores.

mod branch;
mod error;
mod namespace;
mod notifier;
mod object;
mod recorder;
mod sync;

pub use branch::BranchManager;
pub use error::{EngineError, NamespaceError, RecordError};
pub use namespace::{derive_id, Namespace, StoreNamespace, StoreRef};
pub use notifier::{ChangeNotifier, Coalescer, NotifierHandle, SharedMeta};
pub use object::{Activation, StoreObject};
pub use recorder::{read_next_write, LoggingStore, Write};
pub use sync::{SyncError, SyncHandler, SyncPlan};
