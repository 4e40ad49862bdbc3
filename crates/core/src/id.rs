// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log id generation
//!
//! A log id names one branch of a store's write history. It only has to be
//! unique among the branches of a single store, but production ids are
//! globally unique anyway: a nanosecond timestamp plus a random suffix.

use chrono::{SecondsFormat, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;
}

/// Timestamp-based generator for production use
///
/// Ids look like `2026-10-18T09:30:00.123456789Z-3f9a1c2e` and sort by
/// creation time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimestampIdGen;

impl IdGen for TimestampIdGen {
    fn next(&self) -> String {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let token = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", stamp, &token[..8])
    }
}

/// Sequential ID generator for testing
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("log")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_gen_creates_unique_ids() {
        let id_gen = TimestampIdGen;
        let id1 = id_gen.next();
        let id2 = id_gen.next();
        assert_ne!(id1, id2);
        assert!(id1.contains('T'));
        // rfc3339 with nanos (30) + '-' + 8 hex chars
        assert_eq!(id1.len(), 39);
    }

    #[test]
    fn sequential_gen_creates_predictable_ids() {
        let id_gen = SequentialIdGen::new("test");
        assert_eq!(id_gen.next(), "test-1");
        assert_eq!(id_gen.next(), "test-2");
        assert_eq!(id_gen.next(), "test-3");
    }

    #[test]
    fn sequential_gen_is_cloneable_and_shared() {
        let id_gen1 = SequentialIdGen::new("shared");
        let id_gen2 = id_gen1.clone();
        assert_eq!(id_gen1.next(), "shared-1");
        assert_eq!(id_gen2.next(), "shared-2");
        assert_eq!(id_gen1.next(), "shared-3");
    }
}
