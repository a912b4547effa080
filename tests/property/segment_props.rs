//! Segment format invariants over generated postings.

use std::collections::BTreeSet;

use proptest::prelude::*;
use rummage::segment::writer::SegmentWriter;
use rummage::segment::{DiskSegment, DocPosting};

/// Generated per-term postings: strictly increasing doc ids, each doc
/// with a strictly increasing, non-empty position list.
fn postings_strategy() -> impl Strategy<Value = Vec<DocPosting>> {
    prop::collection::vec(
        (1u32..50, prop::collection::vec(1u32..20, 1..8)),
        1..200,
    )
    .prop_map(|raw| {
        let mut doc_id = 0u32;
        raw.into_iter()
            .map(|(gap, pos_gaps)| {
                doc_id += gap;
                let mut position = 0u32;
                let positions: Vec<u32> = pos_gaps
                    .into_iter()
                    .map(|g| {
                        position += g;
                        position
                    })
                    .collect();
                DocPosting {
                    doc_id,
                    term_freq: positions.len() as u32,
                    positions,
                }
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever goes through a segment writer comes back unchanged, with
    /// every format invariant intact.
    #[test]
    fn segment_roundtrip_preserves_postings(postings in postings_strategy()) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("seg-1");
        let docs: BTreeSet<u32> = postings.iter().map(|p| p.doc_id).collect();

        let mut writer = SegmentWriter::create(&dir).unwrap();
        writer.add_term("term", &postings).unwrap();
        writer.finish(1, 0, docs.len() as u32).unwrap();

        let segment = DiskSegment::open(&dir).unwrap();
        let list = segment.read_postings("term").unwrap().unwrap();

        // Doc ids strictly increasing and parallel arrays aligned.
        prop_assert!(list.doc_ids.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(list.doc_ids.len(), list.term_freqs.len());
        prop_assert_eq!(&list.doc_ids, &postings.iter().map(|p| p.doc_id).collect::<Vec<_>>());

        // Skip entries every 128 docs, naming the right doc.
        prop_assert_eq!(list.skips.len(), list.doc_ids.len() / 128);
        for (i, skip) in list.skips.iter().enumerate() {
            prop_assert_eq!(skip.doc_id, list.doc_ids[(i + 1) * 128 - 1]);
        }

        // term_freq equals the number of stored positions, positions
        // strictly increasing, bulk and targeted reads agree.
        let bulk = segment.read_positions("term").unwrap();
        prop_assert_eq!(bulk.len(), postings.len());
        for ((doc_id, positions), original) in bulk.iter().zip(&postings) {
            prop_assert_eq!(*doc_id, original.doc_id);
            prop_assert_eq!(positions, &original.positions);
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(positions.len() as u32, original.term_freq);
            let targeted = segment.positions_for_doc("term", *doc_id).unwrap();
            prop_assert_eq!(targeted.as_ref(), Some(positions));
        }
    }

    /// Flipping any single byte of any segment file is caught at open.
    #[test]
    fn any_single_byte_flip_detected(
        postings in postings_strategy(),
        which_file in 0usize..3,
        flip_seed in any::<u64>(),
    ) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("seg-1");
        let mut writer = SegmentWriter::create(&dir).unwrap();
        writer.add_term("term", &postings).unwrap();
        writer.finish(1, 0, postings.len() as u32).unwrap();

        let name = ["dict", "inv", "pos"][which_file];
        let path = dir.join(name);
        let mut bytes = std::fs::read(&path).unwrap();
        let idx = (flip_seed as usize) % bytes.len();
        bytes[idx] ^= 0x01;
        std::fs::write(&path, bytes).unwrap();

        prop_assert!(DiskSegment::open(&dir).is_err());
    }
}
