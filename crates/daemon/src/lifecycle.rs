// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use kt_adapters::TracedIndexSink;
use kt_core::{ConfigError, ReplicationConfig, SystemClock, TimestampIdGen};
use kt_engine::Namespace;
use kt_index::{IndexError, IndexService};
use kt_storage::{StoreError, WalStore, WalStoreFactory};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::server::{DaemonContext, DaemonNamespace};

/// Environment variable holding the shared secret clients must present
pub const AUTH_TOKEN_VAR: &str = "KT_AUTH_TOKEN";

/// Shortest accepted shared secret
pub const MIN_TOKEN_LEN: usize = 40;

const DEFAULT_KIND: &str = "default";

/// Contents of the daemon's TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub state_dir: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    /// Store kinds served; each gets its own namespace
    pub kinds: Vec<String>,
    #[serde(flatten)]
    pub replication: ReplicationConfig,
}

impl DaemonConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(content)?;
        file.replication.validate()?;
        Ok(file)
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Directory holding one WAL per object store
    pub stores_path: PathBuf,
    /// WAL backing the index catalog
    pub index_path: PathBuf,
    pub kinds: Vec<String>,
    pub replication: ReplicationConfig,
}

impl Config {
    /// Load from `path` if given, else from defaults
    pub fn load(path: Option<&Path>) -> Result<Self, LifecycleError> {
        let file = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| LifecycleError::ConfigRead(path.to_path_buf(), e))?;
                DaemonConfig::parse(&content)?
            }
            None => DaemonConfig::default(),
        };
        Self::from_file(file)
    }

    pub fn from_file(file: DaemonConfig) -> Result<Self, LifecycleError> {
        let state_dir = match file.state_dir {
            Some(dir) => dir,
            None => state_dir()?,
        };
        let socket_path = match (std::env::var_os("KT_SOCKET"), file.socket_path) {
            (Some(env), _) => PathBuf::from(env),
            (None, Some(path)) => path,
            (None, None) => socket_dir().join("ktd.sock"),
        };

        let mut kinds = file.kinds;
        if kinds.is_empty() {
            kinds.push(DEFAULT_KIND.to_string());
        }
        if let Some(kind) = kinds.iter().find(|k| !valid_kind(k)) {
            return Err(ConfigError::Invalid(format!("invalid store kind {:?}", kind)).into());
        }

        Ok(Self {
            socket_path,
            lock_path: state_dir.join("ktd.pid"),
            version_path: state_dir.join("ktd.version"),
            log_path: state_dir.join("ktd.log"),
            stores_path: state_dir.join("stores"),
            index_path: state_dir.join("index.wal"),
            kinds,
            replication: file.replication,
        })
    }
}

/// Kinds become directory names
fn valid_kind(kind: &str) -> bool {
    !kind.is_empty()
        && kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub listener: UnixListener,
    /// Shared with every connection task
    pub context: Arc<DaemonContext>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to read config {0}: {1}")]
    ConfigRead(PathBuf, std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the shared secret from the environment
pub fn auth_token_from_env() -> Result<String, ConfigError> {
    validate_token(std::env::var(AUTH_TOKEN_VAR).ok())
}

fn validate_token(token: Option<String>) -> Result<String, ConfigError> {
    match token {
        Some(token) if token.len() >= MIN_TOKEN_LEN => Ok(token),
        _ => Err(ConfigError::MissingSecret {
            var: AUTH_TOKEN_VAR,
            min_len: MIN_TOKEN_LEN,
        }),
    }
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Secret first; nothing is created for a daemon that could not serve
    let token = auth_token_from_env()?;

    // 2. Acquire lock file - prevents two daemons sharing a state dir
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::create_dir_all(&config.stores_path)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Load the index catalog
    let index = IndexService::open(WalStore::open(&config.index_path)?).await?;
    let context = build_context(config, index, &token);

    // 4. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(kinds = ?config.kinds, "Daemon started");

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        context: Arc::new(context),
    })
}

/// One namespace per configured kind, all reporting to `index`
pub fn build_context(
    config: &Config,
    index: IndexService<WalStore>,
    token: &str,
) -> DaemonContext {
    let sink = TracedIndexSink::new(index.clone());
    let namespaces: BTreeMap<String, DaemonNamespace> = config
        .kinds
        .iter()
        .map(|kind| {
            let namespace = Namespace::new(
                kind.clone(),
                WalStoreFactory::new(config.stores_path.clone()),
                sink.clone(),
                TimestampIdGen,
                SystemClock,
                config.replication.clone(),
            );
            (kind.clone(), namespace)
        })
        .collect();
    DaemonContext::new(namespaces, index, token, config.replication.clone())
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }

    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Get the state directory for kvtail
fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = std::env::var_os("KT_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("kvtail"));
    }
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
        .map(|dir| dir.join("kvtail"))
        .ok_or(LifecycleError::NoStateDir)
}

/// Get the socket directory for kvtail
///
/// Uses /tmp/kvtail by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with KT_SOCKET_DIR for testing.
fn socket_dir() -> PathBuf {
    std::env::var_os("KT_SOCKET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/kvtail"))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
