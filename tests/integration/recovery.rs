//! Durability: reopen, WAL replay, idempotence, orphan sweep.

use std::fs;

use crate::common::Fixture;
use rummage::index::ingest::mtime_millis;
use rummage::index::wal::{Wal, WalEntry, WalOp};

#[test]
fn reopen_after_indexing_fifty_files() {
    let fx = Fixture::new();
    for i in 0..50 {
        fx.write(
            &format!("file{i:02}.md"),
            &format!("readme content for document {i}"),
        );
    }
    {
        let manager = fx.open();
        manager.update(&[fx.data_dir()]).unwrap();
        // Manager dropped here: everything must already be durable.
    }

    let manager = fx.open();
    assert_eq!(manager.status().unwrap().doc_count, 50);
    assert!(!manager.search("readme", 10).unwrap().is_empty());
}

#[test]
fn replay_of_applied_entries_is_idempotent() {
    let fx = Fixture::new();
    let a = fx.write("a.md", "alpha content");
    let b = fx.write("b.md", "beta content");
    {
        let manager = fx.indexed();
        assert_eq!(manager.status().unwrap().doc_count, 2);
    }

    // Simulate a crash between manifest rename and WAL truncation: the
    // log still holds entries whose effects are already on disk.
    let wal = Wal::open(&fx.index_dir().join("wal")).unwrap();
    let mut entries = Vec::new();
    for path in [&a, &b] {
        let canonical = fs::canonicalize(path).unwrap();
        let meta = fs::metadata(&canonical).unwrap();
        entries.push(WalEntry {
            op: WalOp::Add,
            timestamp_ms: 0,
            path: canonical,
            mtime_ms: mtime_millis(&meta),
            size: meta.len() as i64,
        });
    }
    wal.append(&entries).unwrap();
    drop(wal);

    let manager = fx.open();
    // Replay skipped both entries and checkpointed the log.
    assert_eq!(manager.status().unwrap().doc_count, 2);
    assert_eq!(manager.status().unwrap().wal_size_bytes, 0);
    assert_eq!(manager.search("alpha", 10).unwrap().len(), 1);
}

#[test]
fn replay_ingests_missing_effects() {
    let fx = Fixture::new();
    {
        let manager = fx.indexed(); // empty data dir: just creates the index
        assert_eq!(manager.status().unwrap().doc_count, 0);
    }

    // Log an ADD whose effect never made it to disk, as if the process
    // died right after the WAL fsync.
    let path = fx.write("late.md", "late arriving document");
    let canonical = fs::canonicalize(&path).unwrap();
    let meta = fs::metadata(&canonical).unwrap();
    let wal = Wal::open(&fx.index_dir().join("wal")).unwrap();
    wal.append(&[WalEntry {
        op: WalOp::Add,
        timestamp_ms: 0,
        path: canonical.clone(),
        mtime_ms: mtime_millis(&meta),
        size: meta.len() as i64,
    }])
    .unwrap();
    drop(wal);

    let manager = fx.open();
    assert_eq!(manager.status().unwrap().doc_count, 1);
    assert_eq!(manager.search("late", 10).unwrap().len(), 1);
    // Running recovery twice must not duplicate anything.
    drop(manager);
    let manager = fx.open();
    assert_eq!(manager.status().unwrap().doc_count, 1);
}

#[test]
fn replay_applies_logged_deletes() {
    let fx = Fixture::new();
    let path = fx.write("gone.md", "soon to be deleted");
    {
        let manager = fx.indexed();
        assert_eq!(manager.status().unwrap().doc_count, 1);
    }

    let canonical = fs::canonicalize(&path).unwrap();
    let wal = Wal::open(&fx.index_dir().join("wal")).unwrap();
    wal.append(&[WalEntry {
        op: WalOp::Delete,
        timestamp_ms: 0,
        path: canonical,
        mtime_ms: 0,
        size: 0,
    }])
    .unwrap();
    drop(wal);

    let manager = fx.open();
    assert_eq!(manager.status().unwrap().doc_count, 0);
    assert!(manager.search("deleted", 10).unwrap().is_empty());
}

#[test]
fn orphan_segment_directories_swept() {
    let fx = Fixture::new();
    fx.write("a.md", "content");
    {
        let manager = fx.indexed();
        assert_eq!(manager.status().unwrap().segment_count, 1);
    }

    // A crash between segment rename and manifest rename leaves a full
    // segment directory the manifest never learned about, and an
    // interrupted build leaves a .tmp directory.
    let orphan = fx.index_dir().join("seg-99");
    fs::create_dir(&orphan).unwrap();
    fs::write(orphan.join("dict"), b"junk").unwrap();
    let tmp_orphan = fx.index_dir().join("seg-100.tmp");
    fs::create_dir(&tmp_orphan).unwrap();

    let manager = fx.open();
    assert!(!orphan.exists());
    assert!(!tmp_orphan.exists());
    assert_eq!(manager.status().unwrap().doc_count, 1);
}

#[test]
fn truncated_wal_tail_tolerated() {
    let fx = Fixture::new();
    fx.write("a.md", "stable");
    {
        fx.indexed();
    }
    // Append garbage half-record to the current log.
    let current = fx.index_dir().join("wal").join("current.wal");
    let mut bytes = fs::read(&current).unwrap();
    bytes.extend_from_slice(&[1, 0, 0]);
    fs::write(&current, bytes).unwrap();

    let manager = fx.open();
    assert_eq!(manager.status().unwrap().doc_count, 1);
}
