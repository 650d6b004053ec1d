// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cursor-based keyspace traversal.
//!
//! [`KeyspaceScanner`] is a pull-based cursor over one pass of the
//! keyspace. Each call to [`next_batch`](KeyspaceScanner::next_batch) makes
//! one round-trip:
//!
//! ```text
//! SCAN cursor MATCH p COUNT n ──► keys[] ──► inspect_batch (TYPE + MEMORY USAGE)
//!        ▲                                          │
//!        └──────────── next cursor ◄────────────────┘  (0 = pass complete)
//! ```
//!
//! The whole round-trip is retried with backoff, so a failure during
//! inspection never leaves the cursor half-advanced. Keys that vanish
//! before `TYPE` are dropped. Keys the store reports twice (rehashing
//! during the pass) are yielded twice; see the crate docs.
//!
//! A scanner covers exactly one pass. A new pass needs a new scanner;
//! cursors are never carried across invocations.

use std::collections::VecDeque;

use tracing::{debug, instrument};

use crate::config::AnalyzerConfig;
use crate::estimator::MemoryEstimator;
use crate::key_record::RawKeyRecord;
use crate::metrics::LatencyTimer;
use crate::resilience::retry::{retry_if, RetryConfig};
use crate::storage::traits::{KeyInspection, KeyspaceStore, StorageError};

/// Opaque resumption token for the store's scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanCursor(u64);

impl ScanCursor {
    /// Cursor that starts a new pass.
    #[must_use]
    pub fn start() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    NotStarted,
    InProgress,
    Complete,
}

/// Counters for the pass so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanProgress {
    /// Successful round-trips
    pub batches: u64,
    /// Keys returned by SCAN (including duplicates and vanished keys)
    pub keys_listed: u64,
    /// Records handed to the caller
    pub records_yielded: u64,
    /// Keys gone before TYPE
    pub vanished_keys: u64,
}

/// Scanner settings, usually derived from [`AnalyzerConfig`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub match_pattern: String,
    pub batch_size: usize,
    pub probe_memory: bool,
    pub retry: RetryConfig,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&AnalyzerConfig::default())
    }
}

impl From<&AnalyzerConfig> for ScanOptions {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            match_pattern: config.match_pattern.clone(),
            batch_size: config.batch_size,
            probe_memory: config.probe_memory,
            retry: config.scan_retry(),
        }
    }
}

pub struct KeyspaceScanner<'a, S: KeyspaceStore + ?Sized> {
    store: &'a S,
    estimator: &'a MemoryEstimator,
    options: ScanOptions,
    cursor: ScanCursor,
    state: ScanState,
    pending: VecDeque<RawKeyRecord>,
    progress: ScanProgress,
}

impl<'a, S: KeyspaceStore + ?Sized> KeyspaceScanner<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, estimator: &'a MemoryEstimator, options: ScanOptions) -> Self {
        Self {
            store,
            estimator,
            options,
            cursor: ScanCursor::start(),
            state: ScanState::NotStarted,
            pending: VecDeque::new(),
            progress: ScanProgress::default(),
        }
    }

    pub fn progress(&self) -> ScanProgress {
        self.progress
    }

    pub fn cursor(&self) -> ScanCursor {
        self.cursor
    }

    /// True once the store has signalled the end of the pass and every
    /// buffered record has been handed out.
    pub fn is_complete(&self) -> bool {
        self.state == ScanState::Complete && self.pending.is_empty()
    }

    /// Fetch and inspect the next page. Returns `Ok(None)` once the pass
    /// is complete. A page may legitimately be empty (SCAN can return zero
    /// keys with a non-zero cursor).
    #[instrument(skip(self), fields(cursor = self.cursor.value()))]
    pub async fn next_batch(&mut self) -> Result<Option<Vec<RawKeyRecord>>, StorageError> {
        if self.state == ScanState::Complete {
            return Ok(None);
        }

        let timer = LatencyTimer::start();
        let cursor = self.cursor.value();
        let probe_memory = self.options.probe_memory && self.estimator.should_probe();

        let this = &*self;
        let fetched = retry_if(
            "scan_batch",
            &this.options.retry,
            StorageError::is_transient,
            || this.fetch_page(cursor, probe_memory),
        )
        .await;

        let (next_cursor, inspections) = match fetched {
            Ok(page) => page,
            Err(e) => {
                crate::metrics::record_batch("error", timer.elapsed());
                return Err(e);
            }
        };

        let listed = inspections.len();
        let records = self.resolve(inspections);

        self.progress.batches += 1;
        self.progress.keys_listed += listed as u64;
        self.progress.records_yielded += records.len() as u64;
        self.cursor = ScanCursor(next_cursor);
        self.state = if next_cursor == 0 {
            ScanState::Complete
        } else {
            ScanState::InProgress
        };

        crate::metrics::record_batch("success", timer.elapsed());
        crate::metrics::record_keys(listed, records.len());
        debug!(listed, yielded = records.len(), next_cursor, "Scan batch done");

        Ok(Some(records))
    }

    /// Pull one record, fetching pages as needed.
    pub async fn next_record(&mut self) -> Result<Option<RawKeyRecord>, StorageError> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }
            match self.next_batch().await? {
                Some(batch) => self.pending.extend(batch),
                None => return Ok(None),
            }
        }
    }

    async fn fetch_page(
        &self,
        cursor: u64,
        probe_memory: bool,
    ) -> Result<(u64, Vec<KeyInspection>), StorageError> {
        let page = self
            .store
            .scan_batch(cursor, &self.options.match_pattern, self.options.batch_size)
            .await?;
        let inspections = self
            .store
            .inspect_batch(&page.keys, probe_memory, self.estimator.samples())
            .await?;
        Ok((page.next_cursor, inspections))
    }

    fn resolve(&mut self, inspections: Vec<KeyInspection>) -> Vec<RawKeyRecord> {
        let mut records = Vec::with_capacity(inspections.len());
        let mut vanished = 0;

        for inspection in inspections {
            match inspection.key_type {
                Some(key_type) => {
                    let memory = self.estimator.resolve(&inspection.key, key_type, inspection.memory);
                    records.push(RawKeyRecord::new(inspection.key, key_type, memory));
                }
                None => {
                    debug!(key = %String::from_utf8_lossy(&inspection.key), "Key vanished before inspection");
                    vanished += 1;
                }
            }
        }

        if vanished > 0 {
            self.progress.vanished_keys += vanished as u64;
            crate::metrics::record_vanished(vanished);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_record::{KeyType, MemoryUsage};
    use crate::storage::memory::InMemoryKeyspace;

    fn options(batch_size: usize) -> ScanOptions {
        ScanOptions {
            batch_size,
            retry: RetryConfig::test(),
            ..Default::default()
        }
    }

    fn store_with(n: usize) -> InMemoryKeyspace {
        let store = InMemoryKeyspace::new();
        for i in 0..n {
            store.insert(format!("obj:{}", i), KeyType::Hash, Some(10 + i as u64));
        }
        store
    }

    #[tokio::test]
    async fn test_pass_yields_every_key() {
        let store = store_with(23);
        let estimator = MemoryEstimator::new(None);
        let mut scanner = KeyspaceScanner::new(&store, &estimator, options(5));

        let mut count = 0;
        while let Some(record) = scanner.next_record().await.unwrap() {
            assert_eq!(record.key_type, KeyType::Hash);
            assert!(record.memory.is_known());
            count += 1;
        }

        assert_eq!(count, 23);
        assert!(scanner.is_complete());
        let progress = scanner.progress();
        assert_eq!(progress.batches, 5);
        assert_eq!(progress.keys_listed, 23);
        assert_eq!(progress.records_yielded, 23);
    }

    #[tokio::test]
    async fn test_empty_keyspace_completes_in_one_batch() {
        let store = InMemoryKeyspace::new();
        let estimator = MemoryEstimator::new(None);
        let mut scanner = KeyspaceScanner::new(&store, &estimator, options(10));

        assert_eq!(scanner.next_batch().await.unwrap(), Some(vec![]));
        assert_eq!(scanner.next_batch().await.unwrap(), None);
        assert!(scanner.is_complete());
    }

    #[tokio::test]
    async fn test_match_pattern_is_applied() {
        let store = store_with(4);
        store.insert("cfg:main", KeyType::String, Some(1));
        let estimator = MemoryEstimator::new(None);
        let mut scanner = KeyspaceScanner::new(
            &store,
            &estimator,
            ScanOptions {
                match_pattern: "cfg:*".into(),
                ..options(100)
            },
        );

        let batch = scanner.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].key, b"cfg:main".to_vec());
    }

    #[tokio::test]
    async fn test_memory_probe_can_be_disabled() {
        let store = store_with(3);
        let estimator = MemoryEstimator::new(None);
        let mut scanner = KeyspaceScanner::new(
            &store,
            &estimator,
            ScanOptions {
                probe_memory: false,
                ..options(10)
            },
        );

        let batch = scanner.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|r| r.memory == MemoryUsage::Unknown));
    }

    #[tokio::test]
    async fn test_unsupported_memory_is_unknown_but_yielded() {
        let store = InMemoryKeyspace::new();
        store.insert("json:1", KeyType::Unknown, None);
        let estimator = MemoryEstimator::new(None);
        let mut scanner = KeyspaceScanner::new(&store, &estimator, options(10));

        let record = scanner.next_record().await.unwrap().unwrap();
        assert_eq!(record.key_type, KeyType::Unknown);
        assert_eq!(record.memory, MemoryUsage::Unknown);
    }

    #[test]
    fn test_cursor_starts_at_zero() {
        assert_eq!(ScanCursor::start().value(), 0);
        assert_eq!(ScanCursor::default(), ScanCursor::start());
    }
}
