// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction log lifecycle
//!
//! ```text
//! open ─▶ Opened ─▶ replay() ─▶ Replaying ─▶ Recovered ─▶ run() ─▶ ArmedLog ─▶ shutdown()
//!                                    │
//!                                    └─▶ Corrupt (never armed)
//! ```
//!
//! Replay happens exactly once and must run to the end before the write
//! pipeline can be armed, so no write is ever sequenced against a partially
//! read log.

use crate::config::LogConfig;
use crate::error::{LogError, RecoveryError};
use crate::event::Event;
use crate::reader::{EventReader, RecordSource};
use crate::sink::{EventSink, FileSink};
use crate::store::Store;
use crate::writer::{self, DurabilityErrors, LogWriter};
use std::io::BufRead;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Where a log is in its lifecycle before it is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    /// Backing target open, nothing read yet
    Opened,
    /// Replay started but has not reached the end
    Replaying,
    /// Every record was read and validated
    Recovered,
    /// Replay hit a malformed or out-of-order record
    Corrupt,
}

/// A transaction log that has been opened but not yet armed
pub struct TransactionLog<S = FileSink> {
    reader: Option<EventReader<RecordSource>>,
    sink: S,
    config: LogConfig,
    state: LogState,
    last_sequence: u64,
}

impl TransactionLog<FileSink> {
    /// Open or create a log file
    pub fn open(path: &Path, config: LogConfig) -> Result<Self, LogError> {
        let sink = FileSink::open(path, config.sync)?;
        let reader = EventReader::open(path)?;
        info!(path = %path.display(), "opened transaction log");
        Ok(Self::with_reader(reader, sink, config))
    }
}

impl<S: EventSink> TransactionLog<S> {
    /// Build a log from an explicit record source and sink
    pub fn from_parts<R>(source: R, sink: S, config: LogConfig) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let source: RecordSource = Box::new(source);
        Self::with_reader(EventReader::new(source), sink, config)
    }

    fn with_reader(reader: EventReader<RecordSource>, sink: S, config: LogConfig) -> Self {
        Self {
            reader: Some(reader),
            sink,
            config,
            state: LogState::Opened,
            last_sequence: 0,
        }
    }

    pub fn state(&self) -> LogState {
        self.state
    }

    /// Highest sequence number replayed so far
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Stream historical events in record order.
    ///
    /// The iterator stops at the first error. It can only be obtained once;
    /// later calls yield a single [`RecoveryError::AlreadyReplayed`].
    pub fn replay(&mut self) -> Replay<'_> {
        let source = match self.reader.take() {
            Some(reader) => {
                self.state = LogState::Replaying;
                ReplaySource::Reading(reader)
            }
            None => ReplaySource::AlreadyReplayed,
        };
        Replay {
            source,
            state: &mut self.state,
            last_sequence: &mut self.last_sequence,
        }
    }

    /// Replay every event into `store`, returning how many were applied
    pub fn recover_into(&mut self, store: &Store) -> Result<u64, RecoveryError> {
        let mut applied = 0;
        for event in self.replay() {
            store.apply(&event?);
            applied += 1;
        }
        info!(
            applied,
            last_sequence = self.last_sequence,
            "transaction log replayed"
        );
        Ok(applied)
    }

    /// Arm the write pipeline. Sequence numbers continue after the last
    /// replayed event.
    pub fn run(self) -> Result<(ArmedLog, DurabilityErrors), LogError> {
        if self.state != LogState::Recovered {
            warn!(state = ?self.state, "refusing to arm transaction log");
            return Err(LogError::NotRecovered);
        }

        let (writer, errors, worker) = writer::spawn(self.sink, self.last_sequence, &self.config);
        Ok((
            ArmedLog {
                writer,
                worker: Mutex::new(Some(worker)),
                closed: OnceCell::new(),
            },
            errors,
        ))
    }
}

enum ReplaySource {
    Reading(EventReader<RecordSource>),
    AlreadyReplayed,
    Done,
}

/// Replay iterator returned by [`TransactionLog::replay`]
pub struct Replay<'a> {
    source: ReplaySource,
    state: &'a mut LogState,
    last_sequence: &'a mut u64,
}

impl Iterator for Replay<'_> {
    type Item = Result<Event, RecoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = match &mut self.source {
            ReplaySource::Reading(reader) => reader,
            ReplaySource::AlreadyReplayed => {
                self.source = ReplaySource::Done;
                return Some(Err(RecoveryError::AlreadyReplayed));
            }
            ReplaySource::Done => return None,
        };

        match reader.next() {
            Some(Ok(event)) => {
                *self.last_sequence = reader.last_sequence();
                Some(Ok(event))
            }
            Some(Err(e)) => {
                warn!(error = %e, "transaction log replay failed");
                *self.state = LogState::Corrupt;
                self.source = ReplaySource::Done;
                Some(Err(e))
            }
            None => {
                *self.state = LogState::Recovered;
                self.source = ReplaySource::Done;
                None
            }
        }
    }
}

/// A log whose write pipeline is running
pub struct ArmedLog {
    writer: LogWriter,
    worker: Mutex<Option<JoinHandle<u64>>>,
    closed: OnceCell<Result<u64, String>>,
}

impl ArmedLog {
    /// Producer handle; clone it to share between tasks
    pub fn writer(&self) -> &LogWriter {
        &self.writer
    }

    pub fn last_sequence(&self) -> u64 {
        self.writer.last_sequence()
    }

    pub fn failed_appends(&self) -> u64 {
        self.writer.failed_appends()
    }

    /// Drain every queued intent, stop the worker and release the backing
    /// target. Returns the last assigned sequence number. Concurrent and
    /// repeated calls all wait for the same drain and share its result.
    pub async fn shutdown(&self) -> Result<u64, LogError> {
        self.closed
            .get_or_init(|| self.close_worker())
            .await
            .clone()
            .map_err(LogError::Worker)
    }

    async fn close_worker(&self) -> Result<u64, String> {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(worker) = worker else {
            return Ok(self.writer.last_sequence());
        };

        // The worker may already be gone; joining still reports its result
        let _ = self.writer.close().await;
        match worker.await {
            Ok(last_sequence) => {
                info!(last_sequence, "transaction log closed");
                Ok(last_sequence)
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
