// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box tests for argument handling that never reach a daemon

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `kt` isolated from any real daemon or state directory
fn kt(state: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kt").unwrap();
    cmd.env("KT_STATE_DIR", state.path())
        .env("KT_SOCKET", state.path().join("ktd.sock"))
        .env("KT_DAEMON_BINARY", state.path().join("no-such-ktd"))
        .env("KT_AUTH_TOKEN", "t".repeat(40));
    cmd
}

#[test]
fn help_lists_commands() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("index"));
}

#[test]
fn sync_rejects_log_id_without_write_id() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .args(["sync", "lobby", "--from-log-id", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from-write-id"));
}

#[test]
fn sync_rejects_write_id_without_log_id() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .args(["sync", "lobby", "--from-write-id", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from-log-id"));
}

#[test]
fn put_rejects_entry_without_value() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .args(["put", "lobby", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected KEY=VALUE"));
}

#[test]
fn missing_token_is_reported() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .env_remove("KT_AUTH_TOKEN")
        .args(["get", "lobby", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KT_AUTH_TOKEN is not set"));
}

#[test]
fn status_without_daemon() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));
}

#[test]
fn stop_without_daemon() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daemon not running"));
}

#[test]
fn missing_daemon_binary_fails_to_start() {
    let state = TempDir::new().unwrap();
    kt(&state)
        .args(["get", "lobby", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to start daemon"));
}
