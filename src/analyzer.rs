// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! One analyzer run: scan → estimate → normalize → aggregate → report.
//!
//! Failure handling:
//!
//! | Condition                              | Outcome                                  |
//! |----------------------------------------|------------------------------------------|
//! | Store unreachable / auth failure       | [`AnalyzeError::Connectivity`], no report |
//! | Batch retries exhausted, nothing read  | [`AnalyzeError::Connectivity`], no report |
//! | Batch retries exhausted mid-pass       | [`AnalyzeError::Incomplete`] + partial report |
//! | Key vanished before inspection         | dropped, counted in `vanished_keys`      |
//! | Memory not reportable                  | key counted, memory omitted              |

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::aggregator::Aggregator;
use crate::config::AnalyzerConfig;
use crate::estimator::MemoryEstimator;
use crate::metrics::LatencyTimer;
use crate::report::Report;
use crate::scanner::{KeyspaceScanner, ScanOptions};
use crate::storage::redis::RedisKeyspace;
use crate::storage::traits::{KeyspaceStore, StorageError};

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot reach store: {0}")]
    Connectivity(#[source] StorageError),

    /// The pass stopped part way. The partial report is labeled incomplete.
    #[error("Scan aborted after {batches} batches: {source}")]
    Incomplete {
        report: Box<Report>,
        batches: u64,
        #[source]
        source: StorageError,
    },
}

impl AnalyzeError {
    /// Partial report, if the run got far enough to produce one.
    pub fn partial_report(&self) -> Option<&Report> {
        match self {
            Self::Incomplete { report, .. } => Some(&**report),
            _ => None,
        }
    }
}

/// Runs passes over a keyspace with a fixed configuration.
///
/// # Example
///
/// ```
/// # tokio_test_block_on(async {
/// use keyspace_analyzer::{AnalyzerConfig, InMemoryKeyspace, KeyType, KeyspaceAnalyzer};
///
/// let store = InMemoryKeyspace::new();
/// store.insert("user:1:profile", KeyType::Hash, Some(100));
/// store.insert("user:2:profile", KeyType::Hash, Some(120));
///
/// let analyzer = KeyspaceAnalyzer::new(AnalyzerConfig::default()).unwrap();
/// let report = analyzer.run(&store).await.unwrap();
/// assert_eq!(report.rows()[0].pattern, "user:*:profile");
/// assert_eq!(report.totals().total_memory_bytes, 220);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KeyspaceAnalyzer {
    config: AnalyzerConfig,
}

impl KeyspaceAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, AnalyzeError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Connect to the configured Redis, run one pass, release the
    /// connection on every exit path.
    pub async fn connect_and_run(&self) -> Result<Report, AnalyzeError> {
        let info = self.config.connection_info()?;
        let store = RedisKeyspace::connect(info)
            .await
            .map_err(AnalyzeError::Connectivity)?;
        self.run(&store).await
    }

    /// Run one full pass against `store`.
    #[instrument(skip(self, store), fields(target = %self.config.display_target(), pattern = %self.config.match_pattern))]
    pub async fn run<S: KeyspaceStore + ?Sized>(&self, store: &S) -> Result<Report, AnalyzeError> {
        let timer = LatencyTimer::start();
        let config = &self.config;
        info!(batch_size = config.batch_size, "Starting keyspace scan");

        let estimator = MemoryEstimator::new(config.memory_samples);
        let mut scanner = KeyspaceScanner::new(store, &estimator, ScanOptions::from(config));
        let mut aggregator = Aggregator::new(config.normalizer(), config.sample_size);

        loop {
            let batch = match scanner.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    let progress = scanner.progress();
                    crate::metrics::record_run("error", timer.elapsed());

                    if progress.batches == 0 {
                        return Err(AnalyzeError::Connectivity(e));
                    }

                    warn!(
                        batches = progress.batches,
                        records = progress.records_yielded,
                        error = %e,
                        "Scan aborted; keeping partial results"
                    );
                    aggregator.note_vanished(progress.vanished_keys);
                    return Err(AnalyzeError::Incomplete {
                        report: Box::new(aggregator.finalize_incomplete(config.rank_by)),
                        batches: progress.batches,
                        source: e,
                    });
                }
            };

            for record in batch {
                aggregator.merge(record);
            }
            crate::metrics::set_pattern_count(aggregator.pattern_count());

            let progress = scanner.progress();
            if config.progress_every_batches > 0 && progress.batches % config.progress_every_batches == 0 {
                info!(
                    batches = progress.batches,
                    keys = progress.records_yielded,
                    patterns = aggregator.pattern_count(),
                    "Scan progress"
                );
            }
        }

        let progress = scanner.progress();
        aggregator.note_vanished(progress.vanished_keys);
        let report = aggregator.finalize(config.rank_by);

        crate::metrics::record_run("success", timer.elapsed());
        info!(
            keys = report.totals().total_keys,
            patterns = report.pattern_count(),
            vanished = progress.vanished_keys,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Keyspace scan complete"
        );
        Ok(report)
    }
}
