// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-value service: the store and its armed transaction log
//!
//! Every successful mutation is applied to the store and its log intent is
//! enqueued before the store's write lock is released, so records for any
//! key land in the log in the order the store observed them.

use crate::config::FailurePolicy;
use crate::error::{LogError, RecoveryError, ServiceError};
use crate::log::{ArmedLog, TransactionLog};
use crate::sink::EventSink;
use crate::store::Store;
use crate::writer::DurabilityErrors;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from bringing a service up
#[derive(Debug, Error)]
pub enum RecoverError {
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Point-in-time view of the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub keys: usize,
    pub last_sequence: u64,
    pub failed_appends: u64,
    pub policy: FailurePolicy,
}

/// A service returned from [`KvService::recover`]
pub struct Recovered {
    pub service: KvService,
    /// Append failures; someone must keep reading this
    pub errors: DurabilityErrors,
    /// Events replayed from the log
    pub applied: u64,
}

pub struct KvService {
    store: Store,
    log: ArmedLog,
    policy: FailurePolicy,
}

impl KvService {
    /// Replay `log` into a fresh store and arm it for writes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn recover<S: EventSink>(mut log: TransactionLog<S>) -> Result<Recovered, RecoverError> {
        let store = Store::new();
        let applied = log.recover_into(&store)?;
        let policy = log.config().on_append_failure;
        let (log, errors) = log.run()?;

        info!(applied, keys = store.len(), ?policy, "service recovered");
        Ok(Recovered {
            service: KvService { store, log, policy },
            errors,
            applied,
        })
    }

    pub fn get(&self, key: &str) -> Result<String, ServiceError> {
        Ok(self.store.get(key)?)
    }

    /// Set `key` in memory and enqueue its log record.
    ///
    /// Returns once the intent is queued; durability failures arrive later
    /// on the error stream.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        self.check_writable()?;
        let permit = self.log.writer().reserve().await?;
        self.store.put_with(key, value, || permit.put(key, value))?;
        Ok(())
    }

    /// Remove `key` in memory and enqueue its log record. Removing an
    /// absent key still records the delete.
    pub async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.check_writable()?;
        let permit = self.log.writer().reserve().await?;
        self.store.delete_with(key, || permit.delete(key))?;
        Ok(())
    }

    /// Wait until every write accepted so far has reached the log
    pub async fn drain(&self) -> Result<(), ServiceError> {
        Ok(self.log.writer().drain().await?)
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            keys: self.store.len(),
            last_sequence: self.log.last_sequence(),
            failed_appends: self.log.failed_appends(),
            policy: self.policy,
        }
    }

    /// Drain queued writes and close the log. Later writes fail with
    /// [`LogError::Closed`].
    pub async fn shutdown(&self) -> Result<u64, ServiceError> {
        Ok(self.log.shutdown().await?)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn check_writable(&self) -> Result<(), ServiceError> {
        if self.policy == FailurePolicy::RejectWrites {
            let failed = self.log.failed_appends();
            if failed > 0 {
                warn!(failed, "refusing write after append failure");
                return Err(ServiceError::Degraded(failed));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
