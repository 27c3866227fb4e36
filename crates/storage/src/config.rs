// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction log settings

use serde::{Deserialize, Serialize};

/// How hard the writer pushes each record toward the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPolicy {
    /// Hand the record to the OS after every append
    #[default]
    Flush,
    /// Flush and `fdatasync` after every append
    Fsync,
}

/// What the service does with writes after an append has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep accepting writes; failures are only reported
    #[default]
    Continue,
    /// Refuse every put/delete once any append failure has been reported
    RejectWrites,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LogConfig {
    /// Bound on queued write intents; producers wait when it is reached
    pub queue_capacity: usize,
    pub sync: SyncPolicy,
    /// Append a CRC32 field to every record
    pub checksums: bool,
    pub on_append_failure: FailurePolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            sync: SyncPolicy::Flush,
            checksums: true,
            on_append_failure: FailurePolicy::Continue,
        }
    }
}
