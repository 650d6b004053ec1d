// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chaos Testing for the Keyspace Analyzer
//!
//! Failure scenarios driven by a **FailingKeyspace** wrapper: precise error
//! injection at chosen `SCAN` call counts over an in-memory keyspace, plus
//! keys that disappear between `SCAN` and inspection.
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use keyspace_analyzer::{
    AnalyzeError, AnalyzerConfig, InMemoryKeyspace, KeyInspection, KeyType, KeyspaceAnalyzer,
    KeyspaceStore, MemoryProbe, RankBy, ScanPage, StorageError,
};

// =============================================================================
// Failing Keyspace Wrapper - Precise Error Injection
// =============================================================================

/// Wraps a keyspace and fails `scan_batch` on chosen call numbers.
pub struct FailingKeyspace {
    inner: Arc<InMemoryKeyspace>,
    scan_calls: AtomicU64,
    /// Fail on these call numbers (1-indexed)
    fail_on_calls: Vec<u64>,
    /// Error returned on a failing call
    error: StorageError,
    /// Fail every call from `fail_on_calls[0]` onwards
    fail_permanently: AtomicBool,
    /// Keys deleted from `inner` right before the next inspection
    vanish_before_inspect: Mutex<Vec<Vec<u8>>>,
}

impl FailingKeyspace {
    pub fn new(inner: Arc<InMemoryKeyspace>, fail_on_calls: Vec<u64>, error: StorageError) -> Self {
        Self {
            inner,
            scan_calls: AtomicU64::new(0),
            fail_on_calls,
            error,
            fail_permanently: AtomicBool::new(false),
            vanish_before_inspect: Mutex::new(Vec::new()),
        }
    }

    /// A keyspace that fails every scan after the first `n`.
    pub fn fail_after(inner: Arc<InMemoryKeyspace>, n: u64, error: StorageError) -> Self {
        let store = Self::new(inner, vec![n + 1], error);
        store.fail_permanently.store(true, Ordering::SeqCst);
        store
    }

    /// A keyspace that never answers.
    pub fn unreachable(inner: Arc<InMemoryKeyspace>) -> Self {
        Self::fail_after(inner, 0, StorageError::Connectivity("Connection refused".into()))
    }

    pub fn vanish_on_inspect(self, keys: &[&str]) -> Self {
        *self.vanish_before_inspect.lock() = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
        self
    }

    pub fn scan_calls(&self) -> u64 {
        self.scan_calls.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        let count = self.scan_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_permanently.load(Ordering::SeqCst) && !self.fail_on_calls.is_empty() {
            count >= self.fail_on_calls[0]
        } else {
            self.fail_on_calls.contains(&count)
        }
    }
}

#[async_trait]
impl KeyspaceStore for FailingKeyspace {
    async fn scan_batch(&self, cursor: u64, match_pattern: &str, count: usize) -> Result<ScanPage, StorageError> {
        if self.should_fail() {
            return Err(self.error.clone());
        }
        self.inner.scan_batch(cursor, match_pattern, count).await
    }

    async fn type_of(&self, key: &[u8]) -> Result<Option<KeyType>, StorageError> {
        self.inner.type_of(key).await
    }

    async fn memory_of(&self, key: &[u8], samples: Option<u32>) -> Result<MemoryProbe, StorageError> {
        self.inner.memory_of(key, samples).await
    }

    async fn inspect_batch(
        &self,
        keys: &[Vec<u8>],
        probe_memory: bool,
        samples: Option<u32>,
    ) -> Result<Vec<KeyInspection>, StorageError> {
        let doomed: Vec<Vec<u8>> = std::mem::take(&mut *self.vanish_before_inspect.lock());
        for key in &doomed {
            self.inner.remove(key);
        }
        self.inner.inspect_batch(keys, probe_memory, samples).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn seeded_keyspace(users: usize) -> Arc<InMemoryKeyspace> {
    let store = InMemoryKeyspace::new();
    for i in 0..users {
        store.insert(format!("user:{}:profile", i), KeyType::Hash, Some(100));
    }
    Arc::new(store)
}

fn fast_config(batch_size: usize) -> AnalyzerConfig {
    AnalyzerConfig {
        batch_size,
        scan_retry_attempts: 3,
        scan_retry_initial_delay_ms: 1,
        scan_retry_max_delay_ms: 5,
        ..Default::default()
    }
}

fn analyzer(config: AnalyzerConfig) -> KeyspaceAnalyzer {
    KeyspaceAnalyzer::new(config).expect("valid config")
}

// =============================================================================
// Transient Failures - Retried Within Bounds
// =============================================================================

#[tokio::test]
async fn chaos_scan_fails_twice_then_succeeds() {
    let store = FailingKeyspace::new(
        seeded_keyspace(10),
        vec![1, 2],
        StorageError::Connectivity("connection reset".into()),
    );

    let report = analyzer(fast_config(100)).run(&store).await.expect("retries absorb the failures");

    assert!(report.is_complete());
    assert_eq!(report.totals().total_keys, 10);
    assert_eq!(report.rows()[0].pattern, "user:*:profile");
    assert_eq!(report.rows()[0].total_memory_bytes, 1000);
    // Two failures plus the attempt that succeeded
    assert_eq!(store.scan_calls(), 3);
}

#[tokio::test]
async fn chaos_backend_error_mid_scan_is_retried() {
    // 30 keys in pages of 10: calls 1, 2 ok, 3 fails once, 4 retries the last page
    let store = FailingKeyspace::new(
        seeded_keyspace(30),
        vec![3],
        StorageError::Backend("LOADING Redis is loading the dataset in memory".into()),
    );

    let report = analyzer(fast_config(10)).run(&store).await.expect("single failure is retried");

    assert!(report.is_complete());
    assert_eq!(report.totals().total_keys, 30);
    assert_eq!(store.scan_calls(), 4);
}

// =============================================================================
// Hard Failures - No Report or Partial Report
// =============================================================================

#[tokio::test]
async fn chaos_unreachable_before_first_batch() {
    let store = FailingKeyspace::unreachable(seeded_keyspace(5));

    let err = analyzer(fast_config(100)).run(&store).await.unwrap_err();

    assert!(matches!(err, AnalyzeError::Connectivity(StorageError::Connectivity(_))));
    assert!(err.partial_report().is_none());
    assert_eq!(store.scan_calls(), 3);
}

#[tokio::test]
async fn chaos_authentication_failure_not_retried() {
    let store = FailingKeyspace::new(
        seeded_keyspace(5),
        vec![1],
        StorageError::Authentication("NOAUTH Authentication required".into()),
    );

    let err = analyzer(fast_config(100)).run(&store).await.unwrap_err();

    assert!(matches!(err, AnalyzeError::Connectivity(StorageError::Authentication(_))));
    assert_eq!(store.scan_calls(), 1);
}

#[tokio::test]
async fn chaos_store_dies_mid_scan_yields_incomplete_report() {
    // First page succeeds, everything after fails
    let store = FailingKeyspace::fail_after(
        seeded_keyspace(30),
        1,
        StorageError::Connectivity("broken pipe".into()),
    );

    let err = analyzer(fast_config(10)).run(&store).await.unwrap_err();

    match &err {
        AnalyzeError::Incomplete { batches, source, .. } => {
            assert_eq!(*batches, 1);
            assert!(matches!(source, StorageError::Connectivity(_)));
        }
        other => panic!("expected Incomplete, got {:?}", other),
    }

    let partial = err.partial_report().expect("partial report");
    assert!(!partial.is_complete());
    assert_eq!(partial.totals().total_keys, 10);
    assert_eq!(partial.ranked_by(), RankBy::TotalMemory);
}

// =============================================================================
// Keyspace Churn
// =============================================================================

#[tokio::test]
async fn chaos_keys_vanish_between_scan_and_inspect() {
    let store = FailingKeyspace::new(seeded_keyspace(5), vec![], StorageError::Backend(String::new()))
        .vanish_on_inspect(&["user:1:profile", "user:3:profile"]);

    let report = analyzer(fast_config(100)).run(&store).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.totals().total_keys, 3);
    assert_eq!(report.totals().vanished_keys, 2);
    assert_eq!(report.totals().total_memory_bytes, 300);
}

#[tokio::test]
async fn chaos_memory_unsupported_everywhere() {
    // Store refuses MEMORY USAGE for every key; counts must survive
    let inner = InMemoryKeyspace::new();
    for i in 0..50 {
        inner.insert(format!("queue:{}", i), KeyType::List, None);
    }
    let store = FailingKeyspace::new(Arc::new(inner), vec![], StorageError::Backend(String::new()));

    let report = analyzer(fast_config(10)).run(&store).await.unwrap();

    let row = &report.rows()[0];
    assert_eq!(row.pattern, "queue:*");
    assert_eq!(row.key_count, 50);
    assert_eq!(row.total_memory_bytes, 0);
    assert_eq!(row.memory_known_count, 0);
    assert_eq!(row.avg_memory_bytes(), None);
    assert_eq!(report.totals().unknown_memory_keys, 50);
}

#[tokio::test]
async fn chaos_unsupported_keys_first_do_not_hide_later_memory() {
    // Module-type keys sort before the sizable ones, so the scan sees a long
    // run of refusals before the first measurable key.
    for (unsupported_prefix, sized_prefix) in [("a", "z"), ("z", "a")] {
        let inner = InMemoryKeyspace::new();
        for i in 0..40 {
            inner.insert(format!("{}json:{}", unsupported_prefix, i), KeyType::Unknown, None);
            inner.insert(format!("{}str:{}", sized_prefix, i), KeyType::String, Some(100));
        }
        let store = FailingKeyspace::new(Arc::new(inner), vec![], StorageError::Backend(String::new()));

        let report = analyzer(fast_config(10)).run(&store).await.unwrap();

        assert_eq!(report.totals().total_keys, 80);
        assert_eq!(report.totals().total_memory_bytes, 4000, "unsupported prefix {}", unsupported_prefix);
        assert_eq!(report.totals().unknown_memory_keys, 40);
    }
}

#[tokio::test]
async fn chaos_memory_command_rejected_keeps_counts() {
    let inner = InMemoryKeyspace::new();
    for i in 0..25 {
        inner.insert(format!("user:{}", i), KeyType::Hash, Some(100));
    }
    inner.reject_memory_command();
    let store = FailingKeyspace::new(Arc::new(inner), vec![], StorageError::Backend(String::new()));

    let report = analyzer(fast_config(10)).run(&store).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.totals().total_keys, 25);
    assert_eq!(report.totals().total_memory_bytes, 0);
    assert_eq!(report.totals().unknown_memory_keys, 25);
    assert_eq!(report.rows()[0].min_memory_bytes, None);
}
