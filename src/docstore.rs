// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Document metadata table.
//!
//! Maps doc ids to paths, sizes, mtimes, types, and token counts, and
//! answers the field/range lookups the query evaluator needs. Doc ids are
//! handed out monotonically and never reused; deleting a document removes
//! its row here while the postings linger in segments until a merge folds
//! the tombstone in.
//!
//! The table is kept whole in memory behind a `RwLock` and persisted as a
//! JSON file (`documents.db`) with a temp-file + rename, same as the
//! manifest. Row reads and writes are serializable by construction: every
//! operation takes the lock.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Coarse classification by extension; `type:` queries filter on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocType {
    Code,
    Note,
    Doc,
    Data,
    Config,
    Other,
}

impl DocType {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "rs" | "java" | "py" | "js" | "ts" | "tsx" | "jsx" | "c" | "h" | "cpp" | "hpp"
            | "cc" | "go" | "rb" | "php" | "swift" | "kt" | "scala" | "sh" | "sql" | "lua"
            | "zig" | "hs" | "ex" | "erl" | "clj" | "pl" | "r" | "cs" => DocType::Code,
            "md" | "txt" | "org" | "rst" | "adoc" => DocType::Note,
            "html" | "htm" | "pdf" | "doc" | "docx" | "rtf" | "odt" | "tex" => DocType::Doc,
            "json" | "csv" | "tsv" | "xml" | "jsonl" | "ndjson" | "parquet" | "log" => {
                DocType::Data
            }
            "toml" | "yaml" | "yml" | "ini" | "conf" | "cfg" | "env" | "properties" => {
                DocType::Config
            }
            _ => DocType::Other,
        }
    }

    /// Parse a `type:` query value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "code" => Some(DocType::Code),
            "note" => Some(DocType::Note),
            "doc" => Some(DocType::Doc),
            "data" => Some(DocType::Data),
            "config" => Some(DocType::Config),
            "other" => Some(DocType::Other),
            _ => None,
        }
    }
}

/// Immutable metadata record for one indexed file.
///
/// Created on first ingest, replaced whole on re-index, removed on delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: u32,
    pub path: PathBuf,
    pub extension: String,
    pub size_bytes: u64,
    /// Modification time, epoch milliseconds.
    pub mtime_ms: i64,
    pub doc_type: DocType,
    pub token_count: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TableFile {
    next_doc_id: u32,
    documents: Vec<Document>,
}

#[derive(Debug, Default)]
struct Inner {
    next_doc_id: u32,
    by_id: BTreeMap<u32, Document>,
    by_path: HashMap<PathBuf, u32>,
}

/// The persistent metadata table.
pub struct DocStore {
    file: PathBuf,
    inner: RwLock<Inner>,
}

impl DocStore {
    /// Open (or create) the table at `file`.
    pub fn open(file: &Path) -> Result<Self> {
        let mut inner = Inner::default();
        if file.exists() {
            let bytes = fs::read(file)?;
            let table: TableFile = serde_json::from_slice(&bytes)
                .map_err(|e| Error::format_in(file, format!("invalid document table: {}", e)))?;
            inner.next_doc_id = table.next_doc_id;
            for doc in table.documents {
                inner.by_path.insert(doc.path.clone(), doc.doc_id);
                inner.by_id.insert(doc.doc_id, doc);
            }
        }
        Ok(DocStore {
            file: file.to_path_buf(),
            inner: RwLock::new(inner),
        })
    }

    /// Write the table out with temp-file + rename.
    pub fn persist(&self) -> Result<()> {
        let inner = self.inner.read();
        let table = TableFile {
            next_doc_id: inner.next_doc_id,
            documents: inner.by_id.values().cloned().collect(),
        };
        let tmp = self.file.with_extension("tmp");
        let bytes = serde_json::to_vec(&table).map_err(std::io::Error::from)?;
        fs::write(&tmp, bytes)?;
        let f = fs::File::open(&tmp)?;
        f.sync_all()?;
        fs::rename(&tmp, &self.file)?;
        Ok(())
    }

    /// Hand out the next doc id. Ids are monotone and never reused.
    pub fn next_doc_id(&self) -> u32 {
        let mut inner = self.inner.write();
        let id = inner.next_doc_id;
        inner.next_doc_id += 1;
        id
    }

    /// Insert a new document row. Fails if the path is already present.
    pub fn insert(&self, doc: Document) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.by_path.contains_key(&doc.path) {
            return Err(Error::Validation(format!(
                "document already indexed: {}",
                doc.path.display()
            )));
        }
        inner.by_path.insert(doc.path.clone(), doc.doc_id);
        inner.by_id.insert(doc.doc_id, doc);
        Ok(())
    }

    /// Replace size/mtime/token count on an existing row.
    pub fn update(&self, doc_id: u32, size_bytes: u64, mtime_ms: i64, token_count: u32) -> Result<()> {
        let mut inner = self.inner.write();
        let doc = inner.by_id.get_mut(&doc_id).ok_or_else(|| {
            Error::Validation(format!("update of unknown doc id {}", doc_id))
        })?;
        doc.size_bytes = size_bytes;
        doc.mtime_ms = mtime_ms;
        doc.token_count = token_count;
        Ok(())
    }

    pub fn find_by_path(&self, path: &Path) -> Option<Document> {
        let inner = self.inner.read();
        let id = inner.by_path.get(path)?;
        inner.by_id.get(id).cloned()
    }

    pub fn find_by_id(&self, doc_id: u32) -> Option<Document> {
        self.inner.read().by_id.get(&doc_id).cloned()
    }

    pub fn contains_id(&self, doc_id: u32) -> bool {
        self.inner.read().by_id.contains_key(&doc_id)
    }

    /// Remove the row for `path`, returning its doc id.
    pub fn delete_by_path(&self, path: &Path) -> Option<u32> {
        let mut inner = self.inner.write();
        let id = inner.by_path.remove(path)?;
        inner.by_id.remove(&id);
        Some(id)
    }

    /// All live paths with their recorded (mtime, size), for incremental diffing.
    pub fn all_paths(&self) -> HashMap<PathBuf, (i64, u64)> {
        self.inner
            .read()
            .by_id
            .values()
            .map(|d| (d.path.clone(), (d.mtime_ms, d.size_bytes)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Field lookups for the query evaluator. All return doc ids ascending
    // (the id map is ordered, so iteration order is the contract).
    // ------------------------------------------------------------------

    pub fn find_doc_ids_by_extension(&self, ext: &str) -> Vec<u32> {
        let ext = ext.to_ascii_lowercase();
        self.filter_ids(|d| d.extension == ext)
    }

    pub fn find_doc_ids_by_type(&self, doc_type: DocType) -> Vec<u32> {
        self.filter_ids(|d| d.doc_type == doc_type)
    }

    pub fn find_doc_ids_by_mtime_range(&self, lo_ms: i64, hi_ms: i64) -> Vec<u32> {
        self.filter_ids(|d| d.mtime_ms >= lo_ms && d.mtime_ms <= hi_ms)
    }

    pub fn find_doc_ids_by_size_range(&self, lo: u64, hi: u64) -> Vec<u32> {
        self.filter_ids(|d| d.size_bytes >= lo && d.size_bytes <= hi)
    }

    pub fn find_doc_ids_by_path_prefix(&self, prefix: &str) -> Vec<u32> {
        self.filter_ids(|d| d.path.to_string_lossy().starts_with(prefix))
    }

    /// Exact file-name match, ASCII-case-insensitive to match term folding.
    pub fn find_doc_ids_by_file_name(&self, name: &str) -> Vec<u32> {
        self.filter_ids(|d| {
            d.path
                .file_name()
                .map(|f| f.to_string_lossy().eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
    }

    fn filter_ids(&self, pred: impl Fn(&Document) -> bool) -> Vec<u32> {
        self.inner
            .read()
            .by_id
            .values()
            .filter(|d| pred(d))
            .map(|d| d.doc_id)
            .collect()
    }

    /// Count of live documents.
    pub fn total_doc_count(&self) -> u32 {
        self.inner.read().by_id.len() as u32
    }

    /// Average token count over live documents; 0.0 when empty.
    pub fn average_doc_length(&self) -> f64 {
        let inner = self.inner.read();
        if inner.by_id.is_empty() {
            return 0.0;
        }
        let total: u64 = inner.by_id.values().map(|d| u64::from(d.token_count)).sum();
        total as f64 / inner.by_id.len() as f64
    }

    /// Wipe every row. Used by rebuild.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_id.clear();
        inner.by_path.clear();
        // next_doc_id is deliberately NOT reset: ids are never reused.
    }
}
