// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backing targets for the transaction log writer

mod file;

pub use file::FileSink;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSink;

use async_trait::async_trait;
use std::io;

/// Append-only destination for encoded records.
///
/// Only the log's background worker ever holds a sink, which is what keeps
/// a single writer per backing target.
#[async_trait]
pub trait EventSink: Send + 'static {
    /// Append one complete record, newline included
    async fn append(&mut self, record: &[u8]) -> io::Result<()>;

    /// Push everything appended so far to the backing target
    async fn flush(&mut self) -> io::Result<()>;

    /// Drop whatever was appended since the last successful flush, so a
    /// partially written record cannot merge with the next one. Sinks whose
    /// appends are all-or-nothing keep the default.
    async fn rollback(&mut self) -> io::Result<()> {
        Ok(())
    }
}
