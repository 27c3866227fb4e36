// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use kvlog_storage::{
    DurabilityErrors, KvService, LogConfig, LogError, RecoverError, RecoveryError, ServiceError,
    TransactionLog,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::server::ServerContext;

/// Overrides the state directory
pub const STATE_DIR_ENV: &str = "KVLOG_STATE_DIR";

/// Overrides the socket path
pub const SOCKET_ENV: &str = "KVLOG_SOCKET";

/// Startup marker prefix written to the daemon log before anything else.
/// The CLI uses it to find where the current startup attempt begins.
/// Full format: "--- kvlogd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- kvlogd: starting (pid: ";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding every file below unless overridden
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the transaction log
    pub transaction_log_path: PathBuf,
    /// Write pipeline settings
    pub log: LogConfig,
}

/// Contents of `<state_dir>/config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ConfigFile {
    socket: Option<PathBuf>,
    transaction_log: Option<PathBuf>,
    log: LogConfig,
}

impl Config {
    /// Default layout under `state_dir`
    pub fn for_state_dir(state_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            socket_path: state_dir.join("kvlog.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            transaction_log_path: state_dir.join("transaction.log"),
            log: LogConfig::default(),
        }
    }

    /// Resolve the state directory and apply `config.toml` and environment
    /// overrides on top of the default layout
    pub fn load(state_dir: Option<PathBuf>) -> Result<Self, LifecycleError> {
        let state_dir = resolve_state_dir(state_dir)?;
        let mut config = Self::for_state_dir(&state_dir);

        let file_path = state_dir.join("config.toml");
        if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            let file: ConfigFile =
                toml::from_str(&content).map_err(|e| LifecycleError::Config(file_path, e))?;
            if let Some(socket) = file.socket {
                config.socket_path = socket;
            }
            if let Some(path) = file.transaction_log {
                config.transaction_log_path = state_dir.join(path);
            }
            config.log = file.log;
        }

        if let Some(socket) = std::env::var_os(SOCKET_ENV) {
            config.socket_path = PathBuf::from(socket);
        }
        Ok(config)
    }
}

/// Pick the state directory: explicit argument, then `KVLOG_STATE_DIR`,
/// then the platform state directory
pub fn resolve_state_dir(explicit: Option<PathBuf>) -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    // XDG_STATE_HOME on Linux, falling back to ~/.local/state
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
        .map(|dir| dir.join("kvlog"))
        .ok_or(LifecycleError::NoStateDir)
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Service and per-connection state
    pub ctx: Arc<ServerContext>,
    /// Consumes the durability error stream; yields the failure count
    monitor: JoinHandle<u64>,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop accepting connections
        drop(self.listener);

        // 2. Drain queued writes and close the transaction log
        let last_sequence = self
            .ctx
            .service
            .shutdown()
            .await?;

        // 3. The error stream ends once the writer has stopped
        match self.monitor.await {
            Ok(failures) if failures > 0 => {
                warn!(failures, "append failures reported during this session");
            }
            Ok(_) => {}
            Err(e) => warn!("Durability monitor failed: {}", e),
        }

        // 4. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 5. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 6. Lock is released when lock_file is dropped
        info!(last_sequence, "Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Invalid config file {0}: {1}")]
    Config(PathBuf, #[source] toml::de::Error),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Transaction log is corrupt: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Transaction log error: {0}")]
    Log(#[from] LogError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RecoverError> for LifecycleError {
    fn from(e: RecoverError) -> Self {
        match e {
            RecoverError::Recovery(e) => LifecycleError::Recovery(e),
            RecoverError::Log(e) => LifecycleError::Log(e),
        }
    }
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents two writers on one log
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Open and replay the transaction log BEFORE binding the socket.
    // Replay reads the file synchronously, so keep it off the async workers.
    let path = config.transaction_log_path.clone();
    let log_config = config.log.clone();
    let recovered = tokio::task::spawn_blocking(move || {
        let log = TransactionLog::open(&path, log_config)?;
        Ok::<_, LifecycleError>(KvService::recover(log)?)
    })
    .await??;

    info!(
        applied = recovered.applied,
        keys = recovered.service.store().len(),
        path = %config.transaction_log_path.display(),
        "Loaded state from transaction log"
    );

    // 4. Append failures are always consumed
    let monitor = spawn_durability_monitor(recovered.errors);
    let ctx = Arc::new(ServerContext::new(recovered.service));

    // 5. Remove stale socket and bind (LAST - only after recovery succeeds)
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = match UnixListener::bind(&config.socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            if let Err(close) = ctx.service.shutdown().await {
                warn!("Failed to close transaction log: {}", close);
            }
            return Err(LifecycleError::BindFailed(config.socket_path.clone(), e));
        }
    };

    info!("Daemon started in {}", config.state_dir.display());

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        ctx,
        monitor,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Log every append failure until the writer stops. Returns how many were
/// seen.
pub fn spawn_durability_monitor(mut errors: DurabilityErrors) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut failures = 0;
        while let Some(failure) = errors.recv().await {
            failures += 1;
            error!(
                sequence = failure.sequence,
                kind = %failure.kind,
                key = %failure.key,
                error = %failure.source,
                failures,
                "write not durable; memory and log have diverged"
            );
        }
        failures
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
