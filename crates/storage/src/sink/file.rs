// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed sink

use super::EventSink;
use crate::config::SyncPolicy;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Appends records to a log file opened in append mode.
///
/// The file only ever grows by whole, flushed records: anything appended
/// after the last successful flush is truncated away on failure.
pub struct FileSink {
    path: PathBuf,
    file: tokio::fs::File,
    sync: SyncPolicy,
    /// Length of the file up to the last flushed record
    durable_len: u64,
    /// Bytes appended since the last successful flush
    pending: u64,
    /// Set while the file may hold a partial record past `durable_len`
    torn: bool,
}

impl FileSink {
    /// Open or create the log file, creating parent directories as needed
    pub fn open(path: &Path, sync: SyncPolicy) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let durable_len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: tokio::fs::File::from_std(file),
            sync,
            durable_len,
            pending: 0,
            torn: false,
        })
    }
}

#[async_trait]
impl EventSink for FileSink {
    async fn append(&mut self, record: &[u8]) -> io::Result<()> {
        if self.torn {
            self.rollback().await?;
        }

        self.pending += record.len() as u64;
        if let Err(e) = self.file.write_all(record).await {
            self.torn = true;
            return Err(e);
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        let result = match self.file.flush().await {
            Ok(()) if self.sync == SyncPolicy::Fsync => self.file.sync_data().await,
            other => other,
        };
        if let Err(e) = result {
            self.torn = true;
            return Err(e);
        }

        self.durable_len += self.pending;
        self.pending = 0;
        Ok(())
    }

    async fn rollback(&mut self) -> io::Result<()> {
        self.torn = true;
        if let Err(e) = self.file.set_len(self.durable_len).await {
            warn!(
                path = %self.path.display(),
                len = self.durable_len,
                error = %e,
                "failed to truncate partial record; retrying before next append"
            );
            return Err(e);
        }

        if self.pending > 0 {
            debug!(
                path = %self.path.display(),
                discarded = self.pending,
                "truncated unflushed bytes"
            );
        }
        self.pending = 0;
        self.torn = false;
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
