// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-key memory estimation.
//!
//! The store does the real work (`MEMORY USAGE`); the estimator turns its
//! answer into a [`MemoryUsage`]. Two conditions end up as `Unknown`:
//!
//! - the key vanished between `TYPE` and `MEMORY USAGE`
//! - the store refuses to report memory for the key
//!
//! A per-key refusal never affects other keys. Only a refusal of the
//! command itself (unknown, renamed or denied by ACL on managed
//! deployments) stops probing for the rest of the pass.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::key_record::{KeyType, MemoryProbe, MemoryUsage};
use crate::storage::traits::{KeyspaceStore, StorageError};

#[derive(Debug, Default)]
pub struct MemoryEstimator {
    /// `SAMPLES` argument for nested types (None = server default)
    samples: Option<u32>,
    disabled: AtomicBool,
}

impl MemoryEstimator {
    #[must_use]
    pub fn new(samples: Option<u32>) -> Self {
        Self {
            samples,
            ..Default::default()
        }
    }

    pub fn samples(&self) -> Option<u32> {
        self.samples
    }

    /// Whether the store should still be asked for memory.
    #[must_use]
    pub fn should_probe(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    /// Ask the store for a single key's memory.
    pub async fn estimate<S: KeyspaceStore + ?Sized>(
        &self,
        store: &S,
        key: &[u8],
        key_type: KeyType,
    ) -> Result<MemoryUsage, StorageError> {
        if !self.should_probe() {
            return Ok(MemoryUsage::Unknown);
        }
        let probe = store.memory_of(key, self.samples).await?;
        Ok(self.resolve(key, key_type, probe))
    }

    /// Interpret a probe answer that was fetched elsewhere (e.g. pipelined).
    pub fn resolve(&self, key: &[u8], key_type: KeyType, probe: MemoryProbe) -> MemoryUsage {
        match probe {
            MemoryProbe::Bytes(bytes) => MemoryUsage::Known(bytes),
            MemoryProbe::NotFound => {
                debug!(key = %String::from_utf8_lossy(key), "Key vanished before memory inspection");
                crate::metrics::record_unknown_memory("vanished");
                MemoryUsage::Unknown
            }
            MemoryProbe::Unsupported => {
                debug!(
                    key = %String::from_utf8_lossy(key),
                    key_type = %key_type,
                    "Memory inspection unsupported for key"
                );
                crate::metrics::record_unknown_memory(unsupported_reason(key_type));
                MemoryUsage::Unknown
            }
            MemoryProbe::CommandRejected => {
                crate::metrics::record_unknown_memory("command_rejected");
                if !self.disabled.swap(true, Ordering::Relaxed) {
                    warn!("Store rejected the MEMORY USAGE command; memory totals will be unavailable");
                }
                MemoryUsage::Unknown
            }
            MemoryProbe::Skipped => MemoryUsage::Unknown,
        }
    }
}

/// Metric label for an unsupported probe, by key type.
fn unsupported_reason(key_type: KeyType) -> &'static str {
    match key_type {
        KeyType::String
        | KeyType::List
        | KeyType::Set
        | KeyType::Hash
        | KeyType::SortedSet
        | KeyType::Stream => "unsupported",
        KeyType::Unknown => "unsupported_module_type",
    }
}
