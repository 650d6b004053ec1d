// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Keyspace Analyzer
//!
//! A read-only diagnostic for Redis keyspaces: walks every key without
//! blocking the server, groups keys into patterns, and reports how many
//! keys and how much memory each pattern holds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KeyspaceScanner                         │
//! │  • SCAN cursor MATCH p COUNT n, one page per round-trip    │
//! │  • Pipelined TYPE + MEMORY USAGE per page                  │
//! │  • Round-trip retried with backoff                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  RawKeyRecord (key, type, memory)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │           MemoryEstimator  +  PatternNormalizer             │
//! │  • Unknown memory is never counted as zero                 │
//! │  • user:123:profile → user:*:profile                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Aggregator                           │
//! │  • Pattern → count, memory, min/max, type counts, samples  │
//! │  • Order-independent totals                                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  finalize(rank_by)
//!                              ▼
//!                     Report → render (table / JSON)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keyspace_analyzer::{AnalyzerConfig, KeyspaceAnalyzer, ReportOptions, render};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyzerConfig {
//!         redis_url: Some("redis://localhost:6379/0".into()),
//!         ..Default::default()
//!     };
//!
//!     let analyzer = KeyspaceAnalyzer::new(config)?;
//!     let report = analyzer.connect_and_run().await?;
//!     println!("{}", render(&report, &ReportOptions { top: Some(20), ..Default::default() }));
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency
//!
//! `SCAN` guarantees that keys present for the whole pass are returned at
//! least once. Keys added or removed mid-pass may or may not appear, and a
//! key may be returned twice while the server rehashes. The analyzer does
//! not deduplicate, so such keys are counted twice. Holding every key to
//! deduplicate would defeat the bounded-memory scan.
//!
//! ## Normalization limits
//!
//! Classification is per token and heuristic. An all-digit token is always
//! variable, so `shard:1` and `shard:2` merge even when the set of shards is
//! fixed. Mixed tokens like `v2` or short hex like `cafe` stay literal.
//!
//! ## Modules
//!
//! - [`analyzer`]: [`KeyspaceAnalyzer`], one pass end to end
//! - [`scanner`]: cursor-based traversal
//! - [`normalizer`]: key → pattern
//! - [`estimator`]: per-key memory
//! - [`aggregator`]: per-pattern statistics
//! - [`report`] / [`render`]: ranked result and its presentation
//! - [`storage`]: store adapters (Redis, in-memory)
//! - [`resilience`]: retry with backoff

pub mod aggregator;
pub mod analyzer;
pub mod config;
pub mod estimator;
pub mod key_record;
pub mod metrics;
pub mod normalizer;
pub mod render;
pub mod report;
pub mod resilience;
pub mod scanner;
pub mod storage;

pub use aggregator::{Aggregator, PatternStats};
pub use analyzer::{AnalyzeError, KeyspaceAnalyzer};
pub use config::AnalyzerConfig;
pub use estimator::MemoryEstimator;
pub use key_record::{KeyType, MemoryProbe, MemoryUsage, RawKeyRecord};
pub use normalizer::PatternNormalizer;
pub use render::{render, OutputFormat, ReportOptions, SizeUnits};
pub use report::{RankBy, Report, ReportTotals};
pub use resilience::retry::RetryConfig;
pub use scanner::{KeyspaceScanner, ScanCursor, ScanOptions, ScanProgress};
pub use storage::memory::InMemoryKeyspace;
pub use storage::redis::RedisKeyspace;
pub use storage::traits::{KeyInspection, KeyspaceStore, ScanPage, StorageError};
