// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Report rendering: console table or JSON.
//!
//! Rendering never touches analyzer state; it only reads a finished
//! [`Report`]. `top` limits the rows shown, not the rows computed.

use std::fmt::Write as _;

use serde_json::{json, Value};

use crate::aggregator::PatternStats;
use crate::report::Report;

const PATTERN_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeUnits {
    /// B / KB / MB / GB / TB with two decimals
    #[default]
    Human,
    /// Raw byte counts
    Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportOptions {
    /// Show at most this many rows
    pub top: Option<usize>,
    pub units: SizeUnits,
    pub format: OutputFormat,
    /// List sample keys under each table row
    pub show_samples: bool,
}

/// Render with the requested format.
#[must_use]
pub fn render(report: &Report, options: &ReportOptions) -> String {
    match options.format {
        OutputFormat::Table => render_table(report, options),
        OutputFormat::Json => {
            // Value serialization cannot fail: all keys are strings.
            serde_json::to_string_pretty(&to_json(report, options)).unwrap_or_default()
        }
    }
}

/// Format a byte count in binary units, two decimals.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    format_size_f64(bytes as f64)
}

fn format_size_f64(bytes: f64) -> String {
    let mut size = bytes;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} TB", size)
}

fn size_cell(bytes: Option<u64>, units: SizeUnits) -> String {
    match (bytes, units) {
        (None, _) => "-".to_string(),
        (Some(b), SizeUnits::Human) => format_size(b),
        (Some(b), SizeUnits::Bytes) => b.to_string(),
    }
}

fn avg_cell(avg: Option<f64>, units: SizeUnits) -> String {
    match (avg, units) {
        (None, _) => "-".to_string(),
        (Some(a), SizeUnits::Human) => format_size_f64(a),
        (Some(a), SizeUnits::Bytes) => format!("{:.2}", a),
    }
}

fn visible_rows<'r>(report: &'r Report, options: &ReportOptions) -> &'r [PatternStats] {
    match options.top {
        Some(n) => report.top(n),
        None => report.rows(),
    }
}

/// Plain-text table.
#[must_use]
pub fn render_table(report: &Report, options: &ReportOptions) -> String {
    let rows = visible_rows(report, options);
    let width = rows
        .iter()
        .map(|r| r.pattern.chars().count())
        .max()
        .unwrap_or(0)
        .max(PATTERN_WIDTH);
    let rule = "-".repeat(width + 88);

    let mut out = String::new();
    if !report.is_complete() {
        let _ = writeln!(out, "!! INCOMPLETE REPORT: the scan aborted before covering the whole keyspace !!");
    }
    let _ = writeln!(out, "Key Pattern Analysis (ranked by {})", report.ranked_by());
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{:<width$} {:>10} {:>14} {:>14} {:>14} {:>14} {:>10}",
        "Pattern", "Keys", "Total Size", "Avg Size", "Min Size", "Max Size", "Type",
        width = width
    );
    let _ = writeln!(out, "{}", rule);

    for row in rows {
        let _ = writeln!(
            out,
            "{:<width$} {:>10} {:>14} {:>14} {:>14} {:>14} {:>10}",
            row.pattern,
            row.key_count,
            size_cell(Some(row.total_memory_bytes), options.units),
            avg_cell(row.avg_memory_bytes(), options.units),
            size_cell(row.min_memory_bytes, options.units),
            size_cell(row.max_memory_bytes, options.units),
            row.dominant_type().map_or("-", |t| t.as_str()),
            width = width
        );
        if options.show_samples {
            for sample in row.sample_keys_lossy() {
                let _ = writeln!(out, "    e.g. {}", sample);
            }
        }
    }

    let totals = report.totals();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "{} patterns ({} shown), {} keys, {} total",
        report.pattern_count(),
        rows.len(),
        totals.total_keys,
        size_cell(Some(totals.total_memory_bytes), options.units)
    );
    if totals.unknown_memory_keys > 0 {
        let _ = writeln!(out, "{} keys without a memory figure (excluded from sizes)", totals.unknown_memory_keys);
    }
    if totals.vanished_keys > 0 {
        let _ = writeln!(out, "{} keys vanished during the scan (not counted)", totals.vanished_keys);
    }
    out
}

/// JSON document for export.
#[must_use]
pub fn to_json(report: &Report, options: &ReportOptions) -> Value {
    let patterns: Vec<Value> = visible_rows(report, options)
        .iter()
        .map(|row| {
            json!({
                "pattern": row.pattern,
                "key_count": row.key_count,
                "total_memory_bytes": row.total_memory_bytes,
                "memory_known_count": row.memory_known_count,
                "avg_memory_bytes": row.avg_memory_bytes(),
                "min_memory_bytes": row.min_memory_bytes,
                "max_memory_bytes": row.max_memory_bytes,
                "dominant_type": row.dominant_type(),
                "type_counts": row.type_counts,
                "sample_keys": row.sample_keys_lossy(),
            })
        })
        .collect();

    json!({
        "complete": report.is_complete(),
        "ranked_by": report.ranked_by(),
        "totals": report.totals(),
        "pattern_count": report.pattern_count(),
        "patterns": patterns,
    })
}
