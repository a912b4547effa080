//! Incremental updates, tombstones, tiered merges, snapshot pinning.

use crate::common::{hit_paths, Fixture};
use rummage::index::MERGE_FANOUT;

#[test]
fn incremental_delete_removes_matches() {
    let fx = Fixture::new();
    fx.write("keep.md", "Keep this note");
    fx.write("delete.md", "Delete this note");
    let manager = fx.indexed();
    assert_eq!(manager.status().unwrap().doc_count, 2);

    fx.remove("delete.md");
    let report = manager.update(&[fx.data_dir()]).unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(manager.doc_store().total_doc_count(), 1);
    assert!(manager.search("Delete", 10).unwrap().is_empty());
    assert_eq!(hit_paths(&manager.search("Keep", 10).unwrap()), vec!["keep.md"]);
}

#[test]
fn modified_file_reindexed_under_fresh_doc_id() {
    let fx = Fixture::new();
    let path = fx.write("doc.md", "original content here");
    let manager = fx.indexed();
    let old_id = manager
        .doc_store()
        .find_by_path(&std::fs::canonicalize(&path).unwrap())
        .unwrap()
        .doc_id;

    // Rewrite with different content and a different mtime.
    fx.write("doc.md", "replacement content entirely different");
    crate::common::set_mtime(&path, 1_800_000_000);
    let report = manager.update(&[fx.data_dir()]).unwrap();
    assert_eq!(report.updated, 1);

    let new_id = manager
        .doc_store()
        .find_by_path(&std::fs::canonicalize(&path).unwrap())
        .unwrap()
        .doc_id;
    assert!(new_id > old_id, "update must assign a fresh doc id");

    assert!(manager.search("original", 10).unwrap().is_empty());
    assert_eq!(manager.search("replacement", 10).unwrap().len(), 1);
}

#[test]
fn unchanged_files_skipped_on_reindex() {
    let fx = Fixture::new();
    fx.write("a.md", "stable content");
    let manager = fx.indexed();
    let report = manager.update(&[fx.data_dir()]).unwrap();
    assert_eq!(report.added, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.deleted, 0);
}

#[test]
fn ten_level0_segments_merge_into_level1() {
    let fx = Fixture::new();
    let manager = fx.open();
    for i in 0..MERGE_FANOUT {
        fx.write(&format!("f{i}.md"), &format!("document number {i} common"));
        manager.update(&[fx.data_dir()]).unwrap();
    }

    let status = manager.status().unwrap();
    assert_eq!(status.doc_count, MERGE_FANOUT as u32);
    // Ten level-0 segments collapsed into a single level-1 segment.
    assert_eq!(status.segments_per_level.get(&1), Some(&1));
    assert_eq!(status.segments_per_level.get(&0), None);

    // Every document still findable after the merge.
    assert_eq!(
        manager.search("common", 20).unwrap().len(),
        MERGE_FANOUT
    );
}

#[test]
fn merge_folds_tombstones() {
    let fx = Fixture::new();
    let manager = fx.open();
    for i in 0..MERGE_FANOUT {
        fx.write(&format!("f{i}.md"), &format!("payload {i} shared"));
        manager.update(&[fx.data_dir()]).unwrap();
        if i == 4 {
            // Delete an already-flushed doc mid-way; the merge on the
            // final round must not resurrect it.
            fx.remove("f0.md");
        }
    }
    let hits = manager.search("shared", 20).unwrap();
    assert_eq!(hits.len(), MERGE_FANOUT - 1);
    assert!(!hit_paths(&hits).contains(&"f0.md".to_string()));
}

#[test]
fn snapshots_pin_merged_away_segments() {
    let fx = Fixture::new();
    let manager = fx.open();
    for i in 0..MERGE_FANOUT - 1 {
        fx.write(&format!("f{i}.md"), &format!("entry {i}"));
        manager.update(&[fx.data_dir()]).unwrap();
    }
    let snapshot = manager.snapshot();
    let pinned_dirs: Vec<std::path::PathBuf> =
        snapshot.iter().map(|s| s.dir().to_path_buf()).collect();
    assert_eq!(pinned_dirs.len(), MERGE_FANOUT - 1);

    // Trigger the merge while the snapshot is alive.
    fx.write("last.md", "entry last");
    manager.update(&[fx.data_dir()]).unwrap();
    assert_eq!(
        manager.status().unwrap().segments_per_level.get(&1),
        Some(&1)
    );
    for dir in &pinned_dirs {
        assert!(dir.exists(), "snapshot must pin {}", dir.display());
    }

    // Dropping the snapshot releases the superseded files.
    drop(snapshot);
    for dir in &pinned_dirs {
        assert!(!dir.exists(), "{} should be gone", dir.display());
    }
}

#[test]
fn rebuild_starts_from_scratch() {
    let fx = Fixture::new();
    fx.write("a.md", "first era");
    let manager = fx.indexed();
    assert_eq!(manager.status().unwrap().doc_count, 1);

    fx.remove("a.md");
    fx.write("b.md", "second era");
    let report = manager.rebuild(&[fx.data_dir()]).unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(manager.status().unwrap().doc_count, 1);
    assert!(manager.search("first", 10).unwrap().is_empty());
    assert_eq!(manager.search("second", 10).unwrap().len(), 1);
}
