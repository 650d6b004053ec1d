// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the analyzer.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter; without
//! one installed, every call here is a no-op.
//!
//! # Metric Naming Convention
//! - `keyspace_analyzer_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `outcome`: success, error
//! - `reason`: vanished, unsupported, unsupported_module_type

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a finished scan batch round-trip (scan + inspection)
pub fn record_batch(outcome: &str, duration: Duration) {
    counter!(
        "keyspace_analyzer_batches_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("keyspace_analyzer_batch_seconds").record(duration.as_secs_f64());
}

/// Record keys listed by SCAN and records yielded after inspection
pub fn record_keys(listed: usize, yielded: usize) {
    counter!("keyspace_analyzer_keys_listed_total").increment(listed as u64);
    counter!("keyspace_analyzer_keys_yielded_total").increment(yielded as u64);
}

/// Record keys that vanished between SCAN and TYPE
pub fn record_vanished(count: usize) {
    counter!("keyspace_analyzer_keys_vanished_total").increment(count as u64);
}

/// Record a key counted without a memory figure
pub fn record_unknown_memory(reason: &str) {
    counter!(
        "keyspace_analyzer_unknown_memory_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Set the number of distinct patterns seen so far
pub fn set_pattern_count(count: usize) {
    gauge!("keyspace_analyzer_patterns").set(count as f64);
}

/// Record a whole run
pub fn record_run(outcome: &str, duration: Duration) {
    counter!(
        "keyspace_analyzer_runs_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("keyspace_analyzer_run_seconds").record(duration.as_secs_f64());
}

/// Timer that measures elapsed time from creation.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    #[must_use]
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
