// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test utilities for CLI integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use kvlog_daemon::lifecycle::{self, Config};
use kvlog_daemon::server;
use tokio::sync::oneshot;

/// A daemon running on its own thread and runtime, serving `state_dir`
/// the same way kvlogd does.
pub struct TestDaemon {
    state_dir: PathBuf,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TestDaemon {
    pub fn start(state_dir: &Path) -> Self {
        let config = Config::for_state_dir(state_dir);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
            runtime.block_on(async move {
                let daemon = lifecycle::startup(&config)
                    .await
                    .expect("Failed to start daemon");
                ready_tx.send(()).expect("Test went away");

                let ctx = Arc::clone(&daemon.ctx);
                let accept_loop = async {
                    loop {
                        if let Ok((stream, _)) = daemon.listener.accept().await {
                            let ctx = Arc::clone(&ctx);
                            tokio::spawn(async move {
                                let _ = server::handle_connection(&ctx, stream).await;
                            });
                        }
                    }
                };

                tokio::select! {
                    _ = accept_loop => {}
                    _ = stop_rx => {}
                    _ = ctx.shutdown.notified() => {}
                }
                daemon.shutdown().await.expect("Failed to shut down daemon");
            });
        });

        ready_rx.recv().expect("Daemon thread died during startup");
        Self {
            state_dir: state_dir.to_path_buf(),
            stop: Some(stop_tx),
            thread: Some(thread),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Wait for the daemon to finish shutting down
    pub fn join(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.finish();
    }
}
