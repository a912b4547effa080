// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for the rummage command-line interface.
//!
//! Four subcommands: `index` to ingest directories incrementally, `search`
//! to run a query, `status` to show what the index holds, and `rebuild`
//! to drop everything and start over. The boundary clamps arguments
//! (threads to `[1, 64]`, limit to `[0, 1000]`) so the core can assume
//! sane inputs.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Clamp bounds the core assumes were applied here.
pub const MAX_THREADS: usize = 64;
pub const MAX_LIMIT: usize = 1000;

#[derive(Parser)]
#[command(
    name = "rummage",
    about = "Local full-text search over your files",
    version
)]
pub struct Cli {
    /// Directory holding the index (manifest, segments, WAL)
    #[arg(long, global = true, default_value = ".rummage")]
    pub index_dir: PathBuf,

    /// Ingest worker threads (defaults to the CPU count, clamped to 1..=64)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Incrementally index one or more directories
    Index {
        /// Directories (or single files) to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Search the index
    Search {
        /// Query in the rummage DSL, e.g. '"quick brown" ext:md sort:mtime'
        query: String,

        /// Maximum number of results (clamped to 0..=1000)
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show index statistics
    Status,

    /// Drop the index and re-ingest from scratch
    Rebuild {
        /// Directories (or single files) to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
