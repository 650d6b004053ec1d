// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::key_record::{KeyType, MemoryProbe};

/// Failure talking to the store.
///
/// "Key not found" and "memory unsupported" are *answers*, carried in
/// `Option<KeyType>` / [`MemoryProbe`], never errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store unreachable: {0}")]
    Connectivity(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether retrying the same request could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Backend(_))
    }
}

/// One page of a cursor scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next call; `0` means the pass is complete.
    pub next_cursor: u64,
    pub keys: Vec<Vec<u8>>,
}

/// Type and memory of one key, fetched together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInspection {
    pub key: Vec<u8>,
    /// `None` if the key no longer exists.
    pub key_type: Option<KeyType>,
    pub memory: MemoryProbe,
}

#[async_trait]
pub trait KeyspaceStore: Send + Sync {
    /// Fetch one page of keys matching `match_pattern` (glob), hinting
    /// `count` keys per page.
    async fn scan_batch(
        &self,
        cursor: u64,
        match_pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StorageError>;

    /// `TYPE key`; `None` if the key does not exist.
    async fn type_of(&self, key: &[u8]) -> Result<Option<KeyType>, StorageError>;

    /// `MEMORY USAGE key [SAMPLES n]`.
    async fn memory_of(&self, key: &[u8], samples: Option<u32>) -> Result<MemoryProbe, StorageError>;

    /// Inspect a batch of keys (type, then memory if `probe_memory`).
    /// Default implementation falls back to sequential calls.
    async fn inspect_batch(
        &self,
        keys: &[Vec<u8>],
        probe_memory: bool,
        samples: Option<u32>,
    ) -> Result<Vec<KeyInspection>, StorageError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let key_type = self.type_of(key).await?;
            let memory = match key_type {
                None => MemoryProbe::NotFound,
                Some(_) if !probe_memory => MemoryProbe::Skipped,
                Some(_) => self.memory_of(key, samples).await?,
            };
            out.push(KeyInspection {
                key: key.clone(),
                key_type,
                memory,
            });
        }
        Ok(out)
    }
}
