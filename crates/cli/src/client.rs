// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use kt_core::{ErrorClass, IndexEntry, WriteCursor};
use kt_daemon::protocol::{self, ProtocolError};
use kt_daemon::startup::{STARTUP_ERROR_PREFIX, STARTUP_MARKER_PREFIX};
use kt_daemon::{Envelope, Request, Response, StoreAddress, PROTOCOL_VERSION};
use serde_json::Value;
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

/// Environment variable holding the shared secret
const AUTH_TOKEN_VAR: &str = "KT_AUTH_TOKEN";

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for single-response requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("KT_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("KT_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("KT_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("KT_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("KT_AUTH_TOKEN is not set")]
    MissingToken,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Daemon rejected request ({class}): {message}")]
    Rejected { class: ErrorClass, message: String },

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

/// Turn an error response into `Rejected`, anything else into `UnexpectedResponse`
fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { class, message } => ClientError::Rejected { class, message },
        _ => ClientError::UnexpectedResponse,
    }
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
    token: String,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub fn connect_or_start() -> Result<Self, ClientError> {
        match Self::connect() {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => {
                tracing::debug!("daemon not running, starting it");
                let child = start_daemon_background()?;
                Self::connect_with_retry(timeout_connect(), child)
            }
            Err(e) => Err(wrap_with_startup_error(e)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect() -> Result<Self, ClientError> {
        let token = std::env::var(AUTH_TOKEN_VAR).map_err(|_| ClientError::MissingToken)?;
        let socket_path = socket_path();

        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }

        Ok(Self { socket_path, token })
    }

    fn connect_with_retry(
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Check if daemon process exited early (startup failure)
            if let Ok(Some(status)) = child.try_wait() {
                // Poll for startup error in log (filesystem may need to sync)
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = read_startup_error() {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    std::thread::sleep(poll_interval());
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect() {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => {
                    std::thread::sleep(poll_interval());
                }
                Err(e) => return Err(wrap_with_startup_error(e)),
            }
        }

        Err(wrap_with_startup_error(ClientError::DaemonStartTimeout))
    }

    async fn open(&self, request: Request) -> Result<(OwnedReadHalf, OwnedWriteHalf), ClientError> {
        tracing::debug!(request = ?request, "sending request");
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (reader, mut writer) = stream.into_split();

        let envelope = Envelope {
            token: self.token.clone(),
            request,
        };
        let data = protocol::encode(&envelope)?;
        tokio::time::timeout(timeout_ipc(), protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        Ok((reader, writer))
    }

    /// Send a request and receive its single response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let (mut reader, _writer) = self.open(request).await?;
        let response_bytes = tokio::time::timeout(timeout_ipc(), protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        Ok(protocol::decode(&response_bytes)?)
    }

    /// Send a streaming request; responses arrive through the returned stream
    pub async fn stream(&self, request: Request) -> Result<ResponseStream, ClientError> {
        let (reader, writer) = self.open(request).await?;
        Ok(ResponseStream {
            reader,
            _writer: writer,
        })
    }

    pub async fn get(
        &self,
        store: StoreAddress,
        keys: Vec<String>,
    ) -> Result<BTreeMap<String, Value>, ClientError> {
        match self.send(Request::Get { store, keys }).await? {
            Response::Values { values } => Ok(values),
            other => Err(unexpected(other)),
        }
    }

    pub async fn put(
        &self,
        store: StoreAddress,
        entries: BTreeMap<String, Value>,
    ) -> Result<Option<WriteCursor>, ClientError> {
        match self.send(Request::Put { store, entries }).await? {
            Response::Written { cursor } => Ok(cursor),
            other => Err(unexpected(other)),
        }
    }

    pub async fn delete(
        &self,
        store: StoreAddress,
        keys: Vec<String>,
    ) -> Result<Option<WriteCursor>, ClientError> {
        match self.send(Request::Delete { store, keys }).await? {
            Response::Written { cursor } => Ok(cursor),
            other => Err(unexpected(other)),
        }
    }

    pub async fn erase_all(&self, store: StoreAddress) -> Result<WriteCursor, ClientError> {
        match self.send(Request::EraseAll { store }).await? {
            Response::Erased { cursor } => Ok(cursor),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_index(&self) -> Result<Vec<IndexEntry>, ClientError> {
        match self.send(Request::ListIndex).await? {
            Response::IndexEntries { entries } => Ok(entries),
            other => Err(unexpected(other)),
        }
    }

    pub async fn reset_index(&self) -> Result<(), ClientError> {
        match self.send(Request::ResetIndex).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<Response, ClientError> {
        match self.send(Request::Status).await? {
            status @ Response::Status { .. } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon protocol version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: PROTOCOL_VERSION.to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }
}

/// Responses to a streaming request
///
/// Dropping the stream closes the connection, which releases the daemon's
/// side of a finished sync.
pub struct ResponseStream {
    reader: OwnedReadHalf,
    _writer: OwnedWriteHalf,
}

impl ResponseStream {
    /// Next response, or `None` once the daemon closes the connection
    pub async fn next(&mut self) -> Result<Option<Response>, ClientError> {
        match protocol::read_message(&mut self.reader).await {
            Ok(bytes) => Ok(Some(protocol::decode(&bytes)?)),
            Err(ProtocolError::ConnectionClosed) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    let ktd_path = find_ktd_binary();

    // ktd inherits KT_CONFIG and KT_AUTH_TOKEN from our environment
    Command::new(&ktd_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop() -> Result<bool, ClientError> {
    let client = match DaemonClient::connect() {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            if let Ok(dir) = state_dir() {
                cleanup_stale_pid(&dir);
            }
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid()? {
        if shutdown_result.is_ok() {
            wait_for_exit(pid, timeout_exit()).await;
        }

        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(&state_dir()?);

    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the ktd binary
fn find_ktd_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("KT_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Check current executable's directory
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("ktd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    // Fall back to PATH lookup
    PathBuf::from("ktd")
}

/// Socket the daemon listens on
///
/// Mirrors the daemon's resolution: KT_SOCKET, else `ktd.sock` under
/// KT_SOCKET_DIR or /tmp/kvtail.
pub fn socket_path() -> PathBuf {
    if let Some(path) = std::env::var_os("KT_SOCKET") {
        return PathBuf::from(path);
    }
    std::env::var_os("KT_SOCKET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/kvtail"))
        .join("ktd.sock")
}

/// Get the state directory for kvtail (logs, pid, version files)
pub fn state_dir() -> Result<PathBuf, ClientError> {
    if let Some(dir) = std::env::var_os("KT_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("kvtail"));
    }

    let home = std::env::var("HOME").map_err(|_| ClientError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/kvtail"))
}

fn cleanup_stale_pid(state_dir: &std::path::Path) {
    let pid_path = state_dir.join("ktd.pid");
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid() -> Result<Option<u32>, ClientError> {
    let pid_path = state_dir()?.join("ktd.pid");

    if !pid_path.exists() {
        return Ok(None);
    }

    match std::fs::read_to_string(&pid_path) {
        Ok(content) => Ok(content.trim().parse::<u32>().ok()),
        Err(_) => Ok(None),
    }
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    // kill -0 checks for the process without signalling it
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Force kill a daemon process
pub fn force_kill_daemon(pid: u32) -> bool {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Startup marker prefix that daemon writes to log before anything else.
/// Full format: "--- ktd: starting (pid: 12345) ---"
/// Read daemon log from the last startup marker, looking for errors
pub fn read_startup_error() -> Option<String> {
    let log_path = state_dir().ok()?.join("ktd.log");
    let content = std::fs::read_to_string(&log_path).ok()?;
    startup_error_in(&content)
}

fn startup_error_in(log: &str) -> Option<String> {
    let start_pos = log.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &log[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains(STARTUP_ERROR_PREFIX))
        .collect();

    if errors.is_empty() {
        return None;
    }

    // The failure is logged both synchronously and through tracing
    let mut error_messages: Vec<String> = Vec::new();
    for message in errors.iter().filter_map(|line| error_message(line)) {
        if !error_messages.contains(&message) {
            error_messages.push(message);
        }
    }

    if error_messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(error_messages.join("\n"))
    }
}

/// Message part of a daemon error line
fn error_message(line: &str) -> Option<String> {
    // Format: "timestamp LEVEL target: message"
    line.split_once(STARTUP_ERROR_PREFIX)
        .or_else(|| line.split_once(": "))
        .map(|(_, msg)| msg.to_string())
}

/// Wrap an error with startup log info if available
fn wrap_with_startup_error(err: ClientError) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    if let Some(startup_error) = read_startup_error() {
        ClientError::DaemonStartFailed(startup_error)
    } else {
        err
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
