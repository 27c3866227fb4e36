// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asynchronous write pipeline for the transaction log
//!
//! ```text
//! LogWriter ─┐
//! LogWriter ─┼─▶ bounded intent queue ─▶ worker ─▶ EventSink
//! LogWriter ─┘                              │
//!                                           └─▶ DurabilityErrors
//! ```
//!
//! Producers enqueue intents and return immediately. One worker task owns
//! the sink, assigns sequence numbers in queue order, appends and flushes.
//! A failed append is rolled back in the sink, reported on the error
//! stream, and the worker moves on to the next intent.

use crate::config::LogConfig;
use crate::error::{DurabilityError, LogError};
use crate::event::{Event, EventKind};
use crate::sink::EventSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub(crate) enum Intent {
    Record {
        kind: EventKind,
        key: String,
        value: String,
    },
    /// Completed once every intent queued before it has been appended
    Barrier(oneshot::Sender<()>),
    /// Stop accepting intents, drain what is queued, then exit
    Close,
}

impl Intent {
    fn put(key: &str, value: &str) -> Self {
        Intent::Record {
            kind: EventKind::Put,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn delete(key: &str) -> Self {
        Intent::Record {
            kind: EventKind::Delete,
            key: key.to_string(),
            value: String::new(),
        }
    }
}

#[derive(Debug, Default)]
struct WriterStats {
    last_sequence: AtomicU64,
    failed_appends: AtomicU64,
}

/// Producer handle for the write pipeline. Cheap to clone.
#[derive(Clone)]
pub struct LogWriter {
    tx: mpsc::Sender<Intent>,
    stats: Arc<WriterStats>,
}

impl LogWriter {
    /// Enqueue a put. Waits only while the queue is full.
    pub async fn write_put(&self, key: &str, value: &str) -> Result<(), LogError> {
        self.send(Intent::put(key, value)).await
    }

    /// Enqueue a delete. Waits only while the queue is full.
    pub async fn write_delete(&self, key: &str) -> Result<(), LogError> {
        self.send(Intent::delete(key)).await
    }

    /// Reserve a queue slot so an intent can later be enqueued without
    /// waiting, e.g. while a lock is held.
    pub async fn reserve(&self) -> Result<IntentPermit<'_>, LogError> {
        let permit = self.tx.reserve().await.map_err(|_| LogError::Closed)?;
        Ok(IntentPermit { permit })
    }

    /// Wait until every intent enqueued before this call has been appended
    pub async fn drain(&self) -> Result<(), LogError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Intent::Barrier(done_tx)).await?;
        done_rx.await.map_err(|_| LogError::Closed)
    }

    /// Highest sequence number assigned by the worker
    pub fn last_sequence(&self) -> u64 {
        self.stats.last_sequence.load(Ordering::Acquire)
    }

    /// Number of appends that failed since the pipeline was armed
    pub fn failed_appends(&self) -> u64 {
        self.stats.failed_appends.load(Ordering::Acquire)
    }

    pub(crate) async fn close(&self) -> Result<(), LogError> {
        self.send(Intent::Close).await
    }

    async fn send(&self, intent: Intent) -> Result<(), LogError> {
        self.tx.send(intent).await.map_err(|_| LogError::Closed)
    }
}

/// A reserved slot in the intent queue
pub struct IntentPermit<'a> {
    permit: mpsc::Permit<'a, Intent>,
}

impl IntentPermit<'_> {
    pub fn put(self, key: &str, value: &str) {
        self.permit.send(Intent::put(key, value));
    }

    pub fn delete(self, key: &str) {
        self.permit.send(Intent::delete(key));
    }
}

/// Stream of failed appends.
///
/// Yields `None` once the writer has stopped and every error has been
/// delivered. Errors queue without bound until read, so none are lost.
#[must_use = "append failures are only reported through this stream"]
pub struct DurabilityErrors {
    rx: mpsc::UnboundedReceiver<DurabilityError>,
}

impl DurabilityErrors {
    pub async fn recv(&mut self) -> Option<DurabilityError> {
        self.rx.recv().await
    }

    /// Next already-reported error, if any
    pub fn try_recv(&mut self) -> Option<DurabilityError> {
        self.rx.try_recv().ok()
    }
}

/// Start the worker. Sequence numbers continue from `last_sequence`.
pub(crate) fn spawn<S: EventSink>(
    sink: S,
    last_sequence: u64,
    config: &LogConfig,
) -> (LogWriter, DurabilityErrors, JoinHandle<u64>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    let stats = Arc::new(WriterStats::default());
    stats.last_sequence.store(last_sequence, Ordering::Release);

    let worker = Worker {
        sink,
        rx,
        errors: errors_tx,
        stats: Arc::clone(&stats),
        last_sequence,
        checksums: config.checksums,
    };
    let handle = tokio::spawn(worker.run());

    (
        LogWriter { tx, stats },
        DurabilityErrors { rx: errors_rx },
        handle,
    )
}

struct Worker<S> {
    sink: S,
    rx: mpsc::Receiver<Intent>,
    errors: mpsc::UnboundedSender<DurabilityError>,
    stats: Arc<WriterStats>,
    last_sequence: u64,
    checksums: bool,
}

impl<S: EventSink> Worker<S> {
    async fn run(mut self) -> u64 {
        info!(last_sequence = self.last_sequence, "transaction log writer started");

        while let Some(intent) = self.rx.recv().await {
            match intent {
                Intent::Record { kind, key, value } => self.append(kind, key, value).await,
                Intent::Barrier(done) => {
                    let _ = done.send(());
                }
                Intent::Close => {
                    debug!("close requested, draining queued intents");
                    self.rx.close();
                }
            }
        }

        if let Err(e) = self.sink.flush().await {
            warn!(error = %e, "final flush failed");
        }
        info!(last_sequence = self.last_sequence, "transaction log writer stopped");
        self.last_sequence
    }

    async fn append(&mut self, kind: EventKind, key: String, value: String) {
        self.last_sequence += 1;
        let event = Event {
            sequence: self.last_sequence,
            kind,
            key,
            value,
        };

        let mut record = event.to_line(self.checksums);
        record.push('\n');

        let result = match self.sink.append(record.as_bytes()).await {
            Ok(()) => self.sink.flush().await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            // A failed rollback is retried by the sink before its next append
            if let Err(e) = self.sink.rollback().await {
                warn!(
                    sequence = self.last_sequence,
                    error = %e,
                    "rollback after failed append failed"
                );
            }
        }
        self.stats
            .last_sequence
            .store(event.sequence, Ordering::Release);

        match result {
            Ok(()) => debug!(sequence = event.sequence, %kind, key = %event.key, "appended"),
            Err(source) => {
                self.stats.failed_appends.fetch_add(1, Ordering::AcqRel);
                error!(
                    sequence = event.sequence,
                    %kind,
                    key = %event.key,
                    error = %source,
                    "append failed"
                );
                let failure = DurabilityError {
                    sequence: event.sequence,
                    kind,
                    key: event.key,
                    source,
                };
                if self.errors.send(failure).is_err() {
                    warn!("durability error stream dropped; failure only logged");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
