// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The immutable, ranked result of one pass.
//!
//! A [`Report`] always holds every pattern. Ranking can be changed after the
//! fact with [`Report::reranked`] without rescanning; limiting to a top-N is
//! left to the renderer.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregator::PatternStats;

/// Sort key for report rows. Ties are broken by pattern, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    /// Total memory, largest first
    #[default]
    TotalMemory,
    /// Key count, largest first
    KeyCount,
    /// Average memory per key, largest first (patterns without any known size last)
    AvgMemory,
    /// Largest single key, largest first
    MaxMemory,
    /// Pattern, alphabetical
    Pattern,
}

impl RankBy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalMemory => "total_memory",
            Self::KeyCount => "key_count",
            Self::AvgMemory => "avg_memory",
            Self::MaxMemory => "max_memory",
            Self::Pattern => "pattern",
        }
    }

    fn compare(&self, a: &PatternStats, b: &PatternStats) -> Ordering {
        let primary = match self {
            Self::TotalMemory => b.total_memory_bytes.cmp(&a.total_memory_bytes),
            Self::KeyCount => b.key_count.cmp(&a.key_count),
            Self::AvgMemory => b
                .avg_memory_bytes()
                .partial_cmp(&a.avg_memory_bytes())
                .unwrap_or(Ordering::Equal),
            Self::MaxMemory => b.max_memory_bytes.cmp(&a.max_memory_bytes),
            Self::Pattern => Ordering::Equal,
        };
        primary.then_with(|| a.pattern.cmp(&b.pattern))
    }
}

impl std::fmt::Display for RankBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "total_memory" | "memory" | "size" => Ok(Self::TotalMemory),
            "key_count" | "count" | "keys" => Ok(Self::KeyCount),
            "avg_memory" | "avg" => Ok(Self::AvgMemory),
            "max_memory" | "max" => Ok(Self::MaxMemory),
            "pattern" | "name" => Ok(Self::Pattern),
            other => Err(format!(
                "unknown rank key '{}' (expected total_memory, key_count, avg_memory, max_memory or pattern)",
                other
            )),
        }
    }
}

/// Whole-keyspace totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReportTotals {
    pub total_keys: u64,
    pub total_memory_bytes: u64,
    /// Keys counted without a memory figure
    pub unknown_memory_keys: u64,
    /// Keys listed by the scan but gone before inspection (not counted)
    pub vanished_keys: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    rows: Vec<PatternStats>,
    ranked_by: RankBy,
    totals: ReportTotals,
    complete: bool,
}

impl Report {
    pub(crate) fn new(mut rows: Vec<PatternStats>, ranked_by: RankBy, totals: ReportTotals, complete: bool) -> Self {
        rows.sort_by(|a, b| ranked_by.compare(a, b));
        Self {
            rows,
            ranked_by,
            totals,
            complete,
        }
    }

    /// All rows, in rank order.
    pub fn rows(&self) -> &[PatternStats] {
        &self.rows
    }

    /// The first `n` rows.
    pub fn top(&self, n: usize) -> &[PatternStats] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn ranked_by(&self) -> RankBy {
        self.ranked_by
    }

    pub fn totals(&self) -> &ReportTotals {
        &self.totals
    }

    /// False when the scan aborted before covering the keyspace.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn pattern_count(&self) -> usize {
        self.rows.len()
    }

    /// Same data, ranked by another key.
    #[must_use]
    pub fn reranked(&self, rank_by: RankBy) -> Report {
        Report::new(self.rows.clone(), rank_by, self.totals, self.complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stats(pattern: &str, keys: u64, total: u64, known: u64, max: Option<u64>) -> PatternStats {
        PatternStats {
            pattern: pattern.to_string(),
            key_count: keys,
            total_memory_bytes: total,
            memory_known_count: known,
            min_memory_bytes: max,
            max_memory_bytes: max,
            type_counts: BTreeMap::new(),
            sample_keys: vec![],
        }
    }

    fn rows() -> Vec<PatternStats> {
        vec![
            stats("a:*", 10, 100, 10, Some(20)),
            stats("b:*", 2, 1000, 2, Some(900)),
            stats("c:*", 50, 100, 50, Some(5)),
            stats("d:*", 1, 0, 0, None),
        ]
    }

    fn patterns(report: &Report) -> Vec<&str> {
        report.rows().iter().map(|r| r.pattern.as_str()).collect()
    }

    #[test]
    fn test_rank_by_total_memory_with_tie_break() {
        let report = Report::new(rows(), RankBy::TotalMemory, ReportTotals::default(), true);
        assert_eq!(patterns(&report), vec!["b:*", "a:*", "c:*", "d:*"]);
    }

    #[test]
    fn test_rank_by_key_count() {
        let report = Report::new(rows(), RankBy::KeyCount, ReportTotals::default(), true);
        assert_eq!(patterns(&report), vec!["c:*", "a:*", "b:*", "d:*"]);
    }

    #[test]
    fn test_rank_by_avg_puts_unknown_last() {
        let report = Report::new(rows(), RankBy::AvgMemory, ReportTotals::default(), true);
        assert_eq!(patterns(&report), vec!["b:*", "a:*", "c:*", "d:*"]);
    }

    #[test]
    fn test_rank_by_pattern() {
        let report = Report::new(rows(), RankBy::MaxMemory, ReportTotals::default(), true);
        let report = report.reranked(RankBy::Pattern);
        assert_eq!(patterns(&report), vec!["a:*", "b:*", "c:*", "d:*"]);
        assert_eq!(report.ranked_by(), RankBy::Pattern);
    }

    #[test]
    fn test_top_is_bounded() {
        let report = Report::new(rows(), RankBy::TotalMemory, ReportTotals::default(), true);
        assert_eq!(report.top(2).len(), 2);
        assert_eq!(report.top(100).len(), 4);
        assert_eq!(report.pattern_count(), 4);
    }

    #[test]
    fn test_rank_by_from_str() {
        assert_eq!("total-memory".parse::<RankBy>().unwrap(), RankBy::TotalMemory);
        assert_eq!("count".parse::<RankBy>().unwrap(), RankBy::KeyCount);
        assert_eq!("AVG".parse::<RankBy>().unwrap(), RankBy::AvgMemory);
        assert!("bogus".parse::<RankBy>().is_err());
    }
}
