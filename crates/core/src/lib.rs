// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kt-core: shared vocabulary for kvtail
//!
//! This crate provides:
//! - Write cursors, change records and object metadata
//! - The reserved key namespace used by the write log
//! - Sync and index stream message schemas
//! - Replication configuration
//! - Clock and id generation abstractions

pub mod clock;
pub mod config;
pub mod cursor;
pub mod error;
pub mod id;
pub mod keys;
pub mod message;
pub mod meta;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, ReplicationConfig};
pub use cursor::{ChangeRecord, NextWrite, WriteCursor};
pub use error::ErrorClass;
pub use id::{IdGen, SequentialIdGen, TimestampIdGen};
pub use message::{IndexMessage, NoChangesReason, ReadType, RequestError, SyncMessage, SyncRequest};
pub use meta::{IndexEntry, ObjectMeta, StoreId};
