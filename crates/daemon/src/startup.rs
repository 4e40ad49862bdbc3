// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log lines `ktd` writes around a start attempt
//!
//! The client reads these back from `ktd.log` to explain a failed start.

/// Prefix of the marker written before anything else on each start.
/// The client uses it to find where the current attempt begins.
pub const STARTUP_MARKER_PREFIX: &str = "--- ktd: starting (pid: ";

/// Lead-in of every line that records why a start failed
pub const STARTUP_ERROR_PREFIX: &str = "Failed to start daemon: ";

/// Full format: "--- ktd: starting (pid: 12345) ---"
pub fn startup_marker(pid: u32) -> String {
    format!("{}{}) ---", STARTUP_MARKER_PREFIX, pid)
}

/// Line written synchronously when startup fails
pub fn startup_error_line(error: &dyn std::fmt::Display) -> String {
    format!("ERROR {}{}", STARTUP_ERROR_PREFIX, error)
}
