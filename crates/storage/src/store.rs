// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory key-value store rebuilt from transaction log replay

use crate::error::StoreError;
use crate::event::{Event, EventKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Concurrent string map guarded by a shared-read / exclusive-write lock
#[derive(Debug, Default)]
pub struct Store {
    entries: RwLock<HashMap<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored at `key`
    pub fn get(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Set or overwrite `key`
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.put_with(key, value, || {})
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delete_with(key, || {})
    }

    /// Set `key` and run `then` before the write lock is released.
    ///
    /// Anything `then` does is ordered with the mutation: a concurrent
    /// writer to the same store cannot interleave between the two.
    pub fn put_with<F: FnOnce()>(&self, key: &str, value: &str, then: F) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        then();
        Ok(())
    }

    /// Remove `key` and run `then` before the write lock is released
    pub fn delete_with<F: FnOnce()>(&self, key: &str, then: F) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        then();
        Ok(())
    }

    /// Apply a replayed event. Decoded events always carry a valid key.
    pub fn apply(&self, event: &Event) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match event.kind {
            EventKind::Put => {
                entries.insert(event.key.clone(), event.value.clone());
            }
            EventKind::Delete => {
                entries.remove(&event.key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the current contents
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        Err(StoreError::InvalidKey)
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
