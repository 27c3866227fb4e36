// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::time::Duration;

use kvlog_daemon::lifecycle::STARTUP_MARKER_PREFIX;
use kvlog_daemon::protocol::{self, ProtocolError};
use kvlog_daemon::{Config, Request, Response};
use serde::Serialize;
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("KVLOG_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Daemon failed to start: {0}")]
    DaemonStartFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Daemon status as reported by `Request::Status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub keys: usize,
    pub last_sequence: u64,
    pub failed_appends: u64,
}

impl std::fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "uptime:         {}s", self.uptime_secs)?;
        writeln!(f, "keys:           {}", self.keys)?;
        writeln!(f, "last sequence:  {}", self.last_sequence)?;
        write!(f, "failed appends: {}", self.failed_appends)
    }
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to a running daemon using the same configuration it loads
    pub fn connect(state_dir: Option<PathBuf>) -> Result<Self, ClientError> {
        let config = Config::load(state_dir).map_err(|e| ClientError::Config(e.to_string()))?;

        if !config.socket_path.exists() {
            return Err(match read_startup_error(&config.log_path) {
                Some(err) => ClientError::DaemonStartFailed(err),
                None => ClientError::DaemonNotRunning,
            });
        }

        Ok(Self::at(config.socket_path))
    }

    /// Client for an explicit socket path
    pub fn at(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        debug!(?request, socket = %self.socket_path.display(), "sending request");
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        // Encode and send request with write timeout
        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        // Read response with read timeout
        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    /// Value at `key`, or `None` if it is not set
    pub async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        match self.send(Request::Get { key: key.to_string() }).await? {
            Response::Value { value } => Ok(Some(value)),
            Response::NotFound { .. } => Ok(None),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), ClientError> {
        match self
            .send(Request::Put {
                key: key.to_string(),
                value: value.to_string(),
            })
            .await?
        {
            Response::Ok => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), ClientError> {
        match self
            .send(Request::Delete {
                key: key.to_string(),
            })
            .await?
        {
            Response::Ok => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                keys,
                last_sequence,
                failed_appends,
            } => Ok(DaemonStatus {
                uptime_secs,
                keys,
                last_sequence,
                failed_appends,
            }),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Read daemon log from the last startup marker, looking for errors.
/// Returns the error message if found, None otherwise.
pub fn read_startup_error(log_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(log_path).ok()?;

    // Find the last startup marker
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains("Failed to start daemon"))
        .collect();

    // Keep only the message after the "Failed to start daemon: " prefix
    let message = errors
        .last()?
        .split_once("Failed to start daemon: ")
        .map(|(_, msg)| msg.to_string())?;
    Some(message)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
