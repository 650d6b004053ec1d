// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `keyspace-analyzer`: report which key patterns hold the keys and memory
//! of a Redis database.
//!
//! ```sh
//! keyspace-analyzer --host 10.0.0.5 --db 2 --top 20
//! keyspace-analyzer --url redis://:secret@cache:6379/0 --pattern 'session:*' --json
//! ```
//!
//! Exit status is non-zero when the analysis fails or the scan aborted part
//! way (the partial report is still printed, marked INCOMPLETE).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use keyspace_analyzer::{
    render, AnalyzeError, AnalyzerConfig, KeyspaceAnalyzer, OutputFormat, RankBy, ReportOptions,
    SizeUnits,
};

/// Flags left unset fall back to the `--config` file, then to built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "keyspace-analyzer", version)]
#[command(about = "Group Redis keys into patterns and report counts and memory per pattern")]
struct Args {
    /// Connection URL (redis://[user:pass@]host:port/db); overrides host/port/db
    #[arg(long)]
    url: Option<String>,

    /// Server host [default: 127.0.0.1]
    #[arg(long)]
    host: Option<String>,

    /// Server port [default: 6379]
    #[arg(long)]
    port: Option<u16>,

    /// Database index [default: 0]
    #[arg(long)]
    db: Option<i64>,

    /// ACL username
    #[arg(long)]
    username: Option<String>,

    /// Password
    #[arg(long)]
    password: Option<String>,

    /// Only analyze keys matching this glob [default: *]
    #[arg(long)]
    pattern: Option<String>,

    /// SCAN COUNT hint per batch [default: 1000]
    #[arg(long)]
    batch_size: Option<usize>,

    /// Sample keys kept per pattern [default: 5]
    #[arg(long)]
    sample_size: Option<usize>,

    /// Key segment delimiters, as one string [default: ":./"]
    #[arg(long)]
    delimiters: Option<String>,

    /// Row order: total_memory, key_count, avg_memory, max_memory, pattern
    #[arg(long)]
    rank_by: Option<RankBy>,

    /// SAMPLES argument for MEMORY USAGE on aggregate types
    #[arg(long)]
    memory_samples: Option<u32>,

    /// Skip MEMORY USAGE entirely (counts and types only)
    #[arg(long)]
    no_memory: bool,

    /// Show only the first N rows
    #[arg(long)]
    top: Option<usize>,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Print sizes as raw byte counts
    #[arg(long)]
    bytes: bool,

    /// List sample keys under each row
    #[arg(long)]
    samples: bool,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn analyzer_config(&self) -> Result<AnalyzerConfig, AnalyzeError> {
        let mut config = match &self.config {
            Some(path) => AnalyzerConfig::from_json_file(path)?,
            None => AnalyzerConfig::default(),
        };

        if let Some(url) = &self.url {
            config.redis_url = Some(url.clone());
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(db) = self.db {
            config.db = db;
        }
        if self.username.is_some() {
            config.username = self.username.clone();
        }
        if self.password.is_some() {
            config.password = self.password.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.match_pattern = pattern.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = sample_size;
        }
        if let Some(delimiters) = &self.delimiters {
            config.delimiters = delimiters.chars().collect();
        }
        if let Some(rank_by) = self.rank_by {
            config.rank_by = rank_by;
        }
        if self.memory_samples.is_some() {
            config.memory_samples = self.memory_samples;
        }
        if self.no_memory {
            config.probe_memory = false;
        }
        Ok(config)
    }

    fn report_options(&self) -> ReportOptions {
        ReportOptions {
            top: self.top,
            units: if self.bytes { SizeUnits::Bytes } else { SizeUnits::Human },
            format: if self.json { OutputFormat::Json } else { OutputFormat::Table },
            show_samples: self.samples,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match args.analyzer_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let analyzer = match KeyspaceAnalyzer::new(config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = args.report_options();
    match analyzer.connect_and_run().await {
        Ok(report) => {
            println!("{}", render(&report, &options));
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(partial) = e.partial_report() {
                println!("{}", render(partial, &options));
            }
            error!(error = %e, "Analysis failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
