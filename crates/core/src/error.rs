// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error classification shared by every crate

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an error should be handled, independent of where it came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The caller broke the protocol; reject and never truncate silently
    ProtocolViolation,
    /// The write log has a hole; fatal for the sync attempt, not retried
    LogCorruption,
    /// A notification arrived out of order; indicates a bug upstream
    OrderingViolation,
    /// A notification could not be delivered; the next write heals it
    BestEffortDelivery,
    /// Required configuration is missing or invalid
    Configuration,
    /// The underlying store failed
    Storage,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::ProtocolViolation => "protocol_violation",
            ErrorClass::LogCorruption => "log_corruption",
            ErrorClass::OrderingViolation => "ordering_violation",
            ErrorClass::BestEffortDelivery => "best_effort_delivery",
            ErrorClass::Configuration => "configuration",
            ErrorClass::Storage => "storage",
        };
        write!(f, "{}", s)
    }
}
