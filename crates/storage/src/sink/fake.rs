// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::EventSink;
use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Debug, Default)]
struct FakeSinkState {
    records: Vec<String>,
    flushes: usize,
    rollbacks: usize,
    failures_pending: usize,
    failing: bool,
}

/// Fake sink that records appended lines and can inject failures.
///
/// Clones share state, so a test can keep one handle while the log worker
/// owns another.
#[derive(Clone)]
pub struct FakeSink {
    state: Arc<Mutex<FakeSinkState>>,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for FakeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSink {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(FakeSinkState::default())),
            paused: Arc::new(paused),
        }
    }

    /// Records appended so far, without trailing newlines
    pub fn records(&self) -> Vec<String> {
        self.lock().records.clone()
    }

    /// Everything appended so far, as it would appear in a log file
    pub fn contents(&self) -> String {
        self.lock()
            .records
            .iter()
            .map(|r| format!("{}\n", r))
            .collect()
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    /// Fail the next `n` appends
    pub fn fail_next(&self, n: usize) {
        self.lock().failures_pending = n;
    }

    /// Fail every append until turned off again
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Block appends until [`FakeSink::resume`] is called
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeSinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventSink for FakeSink {
    async fn append(&mut self, record: &[u8]) -> io::Result<()> {
        let mut gate = self.paused.subscribe();
        let _ = gate.wait_for(|paused| !*paused).await;

        let mut state = self.lock();
        if state.failing || state.failures_pending > 0 {
            state.failures_pending = state.failures_pending.saturating_sub(1);
            return Err(io::Error::other("injected append failure"));
        }
        let line = String::from_utf8_lossy(record);
        state
            .records
            .push(line.strip_suffix('\n').unwrap_or(&*line).to_string());
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> io::Result<()> {
        self.lock().rollbacks += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
