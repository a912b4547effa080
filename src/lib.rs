// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Local full-text search over the files on your machine.
//!
//! Rummage incrementally ingests source directories, tokenizes mixed
//! Latin + CJK content, and maintains a persistent positional inverted
//! index it answers ranked queries against in milliseconds.
//!
//! # Architecture
//!
//! ```text
//! ingest:  discovery ─▶ bounded queue ─▶ N tokenizer workers
//!              │                              │
//!              ▼                              ▼
//!            WAL ──fsync──▶ MemSegment ──flush──▶ seg-<id>/{dict,inv,pos}
//!                                                   │
//!                               manifest ◀─rename───┘   (tiered merge)
//!
//! query:   DSL parser ─▶ AST ─▶ per-segment evaluator ─▶ BM25 rank
//!                                      │
//!                                      ▼
//!                               snippet synthesis
//! ```
//!
//! Durability follows the classic WAL + atomic-manifest recipe: intended
//! mutations are logged and fsynced first, segments are immutable and
//! checksum-guarded, and the manifest rename is the single linearization
//! point a crash can land on either side of.
//!
//! # Usage
//!
//! ```no_run
//! use rummage::index::{IndexConfig, IndexManager};
//!
//! # fn main() -> rummage::error::Result<()> {
//! let manager = IndexManager::open(IndexConfig::new("/tmp/rummage-index"))?;
//! manager.update(&[std::path::PathBuf::from("/home/me/notes")])?;
//! for hit in manager.search("\"inverted index\" ext:md", 10)? {
//!     println!("{:>6.2}  {}", hit.score, hit.path.display());
//! }
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod codec;
pub mod docstore;
pub mod error;
pub mod index;
pub mod query;
pub mod scoring;
pub mod segment;
pub mod snippet;
pub mod tokenizer;

// Re-exports for the public API surface
pub use docstore::{DocStore, DocType, Document};
pub use error::{Error, ParseError, Result};
pub use index::{IndexConfig, IndexManager, IndexStatus, SearchHit, UpdateReport};
pub use query::{parse as parse_query, ParsedQuery, QueryNode, SortKey};
pub use snippet::{HighlightSpan, Snippet};
pub use tokenizer::{Token, Tokenizer};
