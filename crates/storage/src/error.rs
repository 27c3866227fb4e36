// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the store and the transaction log

use crate::event::EventKind;
use std::io;
use thiserror::Error;

/// Errors returned synchronously by store operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid key: keys must be non-empty")]
    InvalidKey,
    #[error("no such key: {0}")]
    NotFound(String),
}

/// Errors that abort recovery. A log producing one of these is corrupt and
/// must not be served.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },
    #[error("checksum mismatch at line {line}")]
    ChecksumMismatch { line: u64 },
    #[error("out-of-order sequence at line {line}: {sequence} does not follow {previous}")]
    OutOfOrder {
        line: u64,
        sequence: u64,
        previous: u64,
    },
    #[error("transaction log has already been replayed")]
    AlreadyReplayed,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A write intent that failed to reach the backing target.
///
/// The in-memory mutation that produced the intent is not rolled back.
#[derive(Debug, Error)]
#[error("failed to append event {sequence} ({kind} {key:?}): {source}")]
pub struct DurabilityError {
    pub sequence: u64,
    pub kind: EventKind,
    pub key: String,
    #[source]
    pub source: io::Error,
}

/// Errors from transaction log lifecycle operations
#[derive(Debug, Error)]
pub enum LogError {
    #[error("transaction log must be fully replayed before it is armed")]
    NotRecovered,
    #[error("transaction log is closed")]
    Closed,
    #[error("writer task failed: {0}")]
    Worker(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced to callers of the key-value service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("log error: {0}")]
    Log(#[from] LogError),
    #[error("writes refused: {0} append(s) failed and the service is fail-closed")]
    Degraded(u64),
}

impl ServiceError {
    /// True when the error means the key does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::NotFound(_)))
    }
}
