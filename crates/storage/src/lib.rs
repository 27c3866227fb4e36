// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Durable transaction log backing an in-memory key-value store

pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod reader;
pub mod service;
pub mod sink;
pub mod store;
pub mod writer;

pub use config::{FailurePolicy, LogConfig, SyncPolicy};
pub use error::{DurabilityError, LogError, RecoveryError, ServiceError, StoreError};
pub use event::{Event, EventKind};
pub use log::{ArmedLog, LogState, Replay, TransactionLog};
pub use reader::EventReader;
pub use service::{KvService, RecoverError, Recovered, ServiceStatus};
pub use sink::{EventSink, FileSink};
pub use store::Store;
pub use writer::{DurabilityErrors, IntentPermit, LogWriter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use sink::FakeSink;
