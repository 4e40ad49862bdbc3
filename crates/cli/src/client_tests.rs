// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for daemon client behavior.

use super::{socket_path, startup_error_in, unexpected, ClientError, DaemonClient};
use kt_core::ErrorClass;
use kt_daemon::Response;
use tempfile::tempdir;

/// Only test that touches the environment; kept in one function so the
/// variables are never read by a concurrently running test
#[test]
fn connect_reports_missing_socket_and_token() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("ktd.sock");
    std::env::set_var("KT_SOCKET", &socket);

    std::env::remove_var("KT_AUTH_TOKEN");
    assert!(matches!(
        DaemonClient::connect(),
        Err(ClientError::MissingToken)
    ));

    std::env::set_var("KT_AUTH_TOKEN", "t".repeat(40));
    assert_eq!(socket_path(), socket);
    assert!(matches!(
        DaemonClient::connect(),
        Err(ClientError::DaemonNotRunning)
    ));
}

#[test]
fn startup_error_is_read_from_last_attempt_only() {
    let log = "\
--- ktd: starting (pid: 1) ---
ERROR Failed to start daemon: old failure
--- ktd: starting (pid: 2) ---
2026-01-01T00:00:00Z  INFO ktd: Starting ktd
ERROR Failed to start daemon: KT_AUTH_TOKEN must be set to a secret of at least 40 characters
";
    assert_eq!(
        startup_error_in(log).as_deref(),
        Some("KT_AUTH_TOKEN must be set to a secret of at least 40 characters")
    );
}

#[test]
fn failure_logged_by_both_writers_is_reported_once() {
    use kt_daemon::startup::{startup_error_line, startup_marker};

    let failure = "Failed to acquire lock: another ktd is running";
    let log = format!(
        "{}\n2026-01-01T00:00:00.000000Z  INFO ktd: Starting ktd\n{}\n\
         2026-01-01T00:00:00.000100Z ERROR ktd: Failed to start daemon: {}\n",
        startup_marker(42),
        startup_error_line(&failure),
        failure,
    );
    assert_eq!(startup_error_in(&log).as_deref(), Some(failure));
}

#[test]
fn clean_startup_has_no_error() {
    let log = "\
--- ktd: starting (pid: 3) ---
2026-01-01T00:00:00Z  INFO ktd: Daemon ready, listening on /tmp/kvtail/ktd.sock
";
    assert_eq!(startup_error_in(log), None);
}

#[test]
fn log_without_marker_has_no_error() {
    assert_eq!(startup_error_in("ERROR Failed to start daemon: x"), None);
}

#[test]
fn error_responses_become_rejections() {
    let err = unexpected(Response::error(ErrorClass::LogCorruption, "missing record"));
    match err {
        ClientError::Rejected { class, message } => {
            assert_eq!(class, ErrorClass::LogCorruption);
            assert_eq!(message, "missing record");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    assert!(matches!(
        unexpected(Response::Pong),
        ClientError::UnexpectedResponse
    ));
}
