// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The segment-set manifest.
//!
//! The manifest is the single source of truth for which segments
//! participate in queries. It is only ever replaced whole: write
//! `manifest.tmp`, fsync it, rename over `manifest`, fsync the directory.
//! The rename is the linearization point of the commit protocol — a crash
//! on either side of it leaves a complete manifest on disk.
//!
//! Each published manifest carries a generation number. A writer names the
//! generation it based its new segment set on; if another writer got there
//! first the publish fails with `ConcurrentModification` and the caller
//! re-reads and retries.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest";
pub const MANIFEST_TMP_FILE: &str = "manifest.tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: u64,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub generation: u64,
    pub segments: Vec<ManifestEntry>,
}

impl Manifest {
    fn empty() -> Self {
        Manifest {
            version: 1,
            generation: 0,
            segments: Vec::new(),
        }
    }
}

/// Single-writer, multi-reader manifest store.
pub struct ManifestStore {
    dir: PathBuf,
    state: Mutex<Manifest>,
}

impl ManifestStore {
    /// Load the manifest from `dir`, or start empty if none exists yet.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::format_in(&path, format!("invalid manifest: {}", e)))?
        } else {
            Manifest::empty()
        };
        Ok(ManifestStore {
            dir: dir.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub fn current(&self) -> Manifest {
        self.state.lock().clone()
    }

    /// Publish a new segment set based on generation `expected`.
    ///
    /// Fails with `ConcurrentModification` (without touching disk) if the
    /// manifest has moved past `expected`; the caller re-reads and retries.
    pub fn publish(&self, expected: u64, segments: Vec<ManifestEntry>) -> Result<Manifest> {
        let mut state = self.state.lock();
        if state.generation != expected {
            return Err(Error::ConcurrentModification { retries: 0 });
        }
        let next = Manifest {
            version: state.version,
            generation: state.generation + 1,
            segments,
        };

        let tmp = self.dir.join(MANIFEST_TMP_FILE);
        let bytes = serde_json::to_vec_pretty(&next).map_err(std::io::Error::from)?;
        fs::write(&tmp, bytes)?;
        File::open(&tmp)?.sync_all()?;
        fs::rename(&tmp, self.dir.join(MANIFEST_FILE))?;
        // Make the rename itself durable.
        File::open(&self.dir)?.sync_all()?;

        *state = next.clone();
        Ok(next)
    }
}
