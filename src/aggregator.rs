// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Streaming reduce of key records into per-pattern statistics.
//!
//! Each merge normalizes the key, then updates that pattern's counters.
//! Counters are sums, minima and maxima, so the final table does not
//! depend on arrival order. Sample keys do: they are the first K keys seen
//! for the pattern.
//!
//! The aggregator never deduplicates. Merging the same physical key twice
//! counts it twice.
//!
//! # Example
//!
//! ```
//! use keyspace_analyzer::{Aggregator, KeyType, MemoryUsage, PatternNormalizer, RankBy, RawKeyRecord};
//!
//! let mut agg = Aggregator::new(PatternNormalizer::default(), 2);
//! for id in [123, 456, 789] {
//!     let key = format!("user:{}:profile", id).into_bytes();
//!     agg.merge(RawKeyRecord::new(key, KeyType::Hash, MemoryUsage::Known(100)));
//! }
//!
//! let report = agg.finalize(RankBy::TotalMemory);
//! let row = &report.rows()[0];
//! assert_eq!(row.pattern, "user:*:profile");
//! assert_eq!(row.key_count, 3);
//! assert_eq!(row.total_memory_bytes, 300);
//! assert_eq!(row.sample_keys.len(), 2);
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::key_record::{KeyType, RawKeyRecord};
use crate::normalizer::PatternNormalizer;
use crate::report::{RankBy, Report, ReportTotals};

/// Running statistics for one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStats {
    pub pattern: String,
    pub key_count: u64,
    /// Sum over keys with known memory only
    pub total_memory_bytes: u64,
    /// Keys that contributed to `total_memory_bytes`
    pub memory_known_count: u64,
    pub min_memory_bytes: Option<u64>,
    pub max_memory_bytes: Option<u64>,
    pub type_counts: BTreeMap<KeyType, u64>,
    pub sample_keys: Vec<Vec<u8>>,
}

impl PatternStats {
    fn new(pattern: String) -> Self {
        Self {
            pattern,
            key_count: 0,
            total_memory_bytes: 0,
            memory_known_count: 0,
            min_memory_bytes: None,
            max_memory_bytes: None,
            type_counts: BTreeMap::new(),
            sample_keys: Vec::new(),
        }
    }

    fn record(&mut self, record: RawKeyRecord, sample_size: usize) {
        self.key_count += 1;
        *self.type_counts.entry(record.key_type).or_insert(0) += 1;

        if let Some(bytes) = record.memory.bytes() {
            self.add_memory(bytes);
        }

        if self.sample_keys.len() < sample_size {
            self.sample_keys.push(record.key);
        }
    }

    fn add_memory(&mut self, bytes: u64) {
        self.total_memory_bytes = self.total_memory_bytes.saturating_add(bytes);
        self.memory_known_count += 1;
        self.min_memory_bytes = Some(self.min_memory_bytes.map_or(bytes, |m| m.min(bytes)));
        self.max_memory_bytes = Some(self.max_memory_bytes.map_or(bytes, |m| m.max(bytes)));
    }

    fn absorb(&mut self, other: PatternStats, sample_size: usize) {
        self.key_count += other.key_count;
        self.total_memory_bytes = self.total_memory_bytes.saturating_add(other.total_memory_bytes);
        self.memory_known_count += other.memory_known_count;
        self.min_memory_bytes = min_opt(self.min_memory_bytes, other.min_memory_bytes);
        self.max_memory_bytes = max_opt(self.max_memory_bytes, other.max_memory_bytes);
        for (key_type, count) in other.type_counts {
            *self.type_counts.entry(key_type).or_insert(0) += count;
        }
        let room = sample_size.saturating_sub(self.sample_keys.len());
        self.sample_keys.extend(other.sample_keys.into_iter().take(room));
    }

    /// Mean over keys with known memory; `None` if no key had one.
    #[must_use]
    pub fn avg_memory_bytes(&self) -> Option<f64> {
        (self.memory_known_count > 0).then(|| self.total_memory_bytes as f64 / self.memory_known_count as f64)
    }

    /// Keys whose memory could not be determined.
    #[must_use]
    pub fn unknown_memory_count(&self) -> u64 {
        self.key_count - self.memory_known_count
    }

    /// Most frequent type; ties go to the earlier variant.
    #[must_use]
    pub fn dominant_type(&self) -> Option<KeyType> {
        self.type_counts
            .iter()
            .max_by(|(ta, ca), (tb, cb)| ca.cmp(cb).then_with(|| tb.cmp(ta)))
            .map(|(t, _)| *t)
    }

    /// Sample keys rendered for humans.
    #[must_use]
    pub fn sample_keys_lossy(&self) -> Vec<String> {
        self.sample_keys
            .iter()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    }
}

fn min_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn max_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Pattern → stats table with a single owner.
#[derive(Debug, Clone)]
pub struct Aggregator {
    normalizer: PatternNormalizer,
    sample_size: usize,
    patterns: HashMap<String, PatternStats>,
    records: u64,
    vanished_keys: u64,
}

impl Aggregator {
    #[must_use]
    pub fn new(normalizer: PatternNormalizer, sample_size: usize) -> Self {
        Self {
            normalizer,
            sample_size,
            patterns: HashMap::new(),
            records: 0,
            vanished_keys: 0,
        }
    }

    /// Fold one record into its pattern's stats.
    pub fn merge(&mut self, record: RawKeyRecord) {
        let pattern = self.normalizer.normalize(&record.key);
        self.records += 1;
        self.patterns
            .entry(pattern)
            .or_insert_with_key(|p| PatternStats::new(p.clone()))
            .record(record, self.sample_size);
    }

    /// Note keys dropped because they vanished before inspection.
    pub fn note_vanished(&mut self, count: u64) {
        self.vanished_keys += count;
    }

    /// Combine another aggregator's table into this one.
    pub fn absorb(&mut self, other: Aggregator) {
        self.records += other.records;
        self.vanished_keys += other.vanished_keys;
        for (pattern, stats) in other.patterns {
            match self.patterns.get_mut(&pattern) {
                Some(existing) => existing.absorb(stats, self.sample_size),
                None => {
                    let mut stats = stats;
                    stats.sample_keys.truncate(self.sample_size);
                    self.patterns.insert(pattern, stats);
                }
            }
        }
    }

    /// Number of distinct patterns so far
    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Number of records merged so far
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.records
    }

    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<&PatternStats> {
        self.patterns.get(pattern)
    }

    /// Build the full ranked report. Every pattern is kept; truncation is
    /// a rendering concern.
    #[must_use]
    pub fn finalize(self, rank_by: RankBy) -> Report {
        self.build(rank_by, true)
    }

    /// Build a report for a pass that did not finish.
    #[must_use]
    pub fn finalize_incomplete(self, rank_by: RankBy) -> Report {
        self.build(rank_by, false)
    }

    fn build(self, rank_by: RankBy, complete: bool) -> Report {
        let rows: Vec<PatternStats> = self.patterns.into_values().collect();
        let totals = ReportTotals {
            total_keys: rows.iter().map(|r| r.key_count).sum(),
            total_memory_bytes: rows.iter().map(|r| r.total_memory_bytes).sum(),
            unknown_memory_keys: rows.iter().map(|r| r.unknown_memory_count()).sum(),
            vanished_keys: self.vanished_keys,
        };
        Report::new(rows, rank_by, totals, complete)
    }
}
