// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Rummage CLI: index directories and search them.
//!
//! ```bash
//! # Ingest (incremental: re-runs pick up changed and deleted files)
//! rummage index ~/notes ~/src
//!
//! # Query with the DSL
//! rummage search '"inverted index" ext:md sort:mtime' --limit 20
//!
//! # What does the index hold?
//! rummage status
//! ```

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use rummage::error::Error;
use rummage::index::{IndexConfig, IndexManager, SearchHit};

mod cli;
use cli::{Cli, Commands, OutputFormat, MAX_LIMIT, MAX_THREADS};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::QueryParse(parse_error)) => {
            eprintln!("{}", parse_error.render());
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> rummage::error::Result<()> {
    let mut config = IndexConfig::new(cli.index_dir.clone());
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    config.threads = config.threads.clamp(1, MAX_THREADS);

    match cli.command {
        Commands::Index { paths } => {
            let manager = IndexManager::open(config)?;
            let spinner = indexing_spinner("indexing");
            let started = Instant::now();
            let report = manager.update(&paths)?;
            spinner.finish_and_clear();
            println!(
                "indexed {} added, {} updated, {} deleted, {} skipped in {:.1}s",
                report.added,
                report.updated,
                report.deleted,
                report.skipped,
                started.elapsed().as_secs_f64()
            );
        }
        Commands::Rebuild { paths } => {
            let manager = IndexManager::open(config)?;
            let spinner = indexing_spinner("rebuilding");
            let started = Instant::now();
            let report = manager.rebuild(&paths)?;
            spinner.finish_and_clear();
            println!(
                "rebuilt: {} documents in {:.1}s",
                report.added,
                started.elapsed().as_secs_f64()
            );
        }
        Commands::Search { query, limit, format } => {
            let manager = IndexManager::open(config)?;
            let limit = limit.min(MAX_LIMIT);
            let started = Instant::now();
            let hits = manager.search(&query, limit)?;
            let elapsed = started.elapsed();
            match format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&hits).map_err(std::io::Error::from)?
                    );
                }
                OutputFormat::Text => print_hits(&hits, elapsed.as_secs_f64()),
            }
        }
        Commands::Status => {
            let manager = IndexManager::open(config)?;
            let status = manager.status()?;
            println!("documents : {}", status.doc_count);
            println!("segments  : {}", status.segment_count);
            for (level, count) in &status.segments_per_level {
                println!("  level {} : {}", level, count);
            }
            println!("index size: {}", human_bytes(status.index_size_bytes));
            println!("wal size  : {}", human_bytes(status.wal_size_bytes));
        }
    }
    Ok(())
}

fn print_hits(hits: &[SearchHit], elapsed_secs: f64) {
    if hits.is_empty() {
        println!("no matches ({:.0} ms)", elapsed_secs * 1000.0);
        return;
    }
    for hit in hits {
        println!("{:>8.3}  {}", hit.score, hit.path.display());
        for snippet in &hit.snippets {
            let line = snippet.text.replace('\n', " ");
            println!("          {}: {}", snippet.line, line.trim());
        }
    }
    println!("{} hit(s) in {:.0} ms", hits.len(), elapsed_secs * 1000.0);
}

fn indexing_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .expect("static template"),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
