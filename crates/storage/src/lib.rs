// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Key-value storage for kvtail object stores
//!
//! Every backend offers the same narrow contract: point and multi-key reads,
//! ordered paginated listing, atomic batch application, and bulk erase.
//! There is no change feed; the write log in `kt-engine` derives one.

mod factory;
mod memory;
mod state;
mod store;
mod wal;
mod wal_store;

pub use factory::{MemoryStoreFactory, StoreFactory, WalStoreFactory};
pub use memory::MemoryStore;
pub use state::KeySpace;
pub use store::{ListOptions, Mutation, Store, StoreError};
pub use wal::{Wal, WalError};
pub use wal_store::WalStore;
