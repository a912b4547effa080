//! On-disk segment format: postings round-trips, skip entries, CRC guards.

use std::fs;

use rummage::codec;
use rummage::segment::writer::SegmentWriter;
use rummage::segment::{DiskSegment, DocPosting, DICT_FILE, INV_FILE};

fn posting(doc_id: u32, positions: &[u32]) -> DocPosting {
    DocPosting {
        doc_id,
        term_freq: positions.len() as u32,
        positions: positions.to_vec(),
    }
}

/// Deterministic "random increasing" doc ids: gaps vary from 1 to 61.
fn increasing_doc_ids(count: usize) -> Vec<u32> {
    let mut ids = Vec::with_capacity(count);
    let mut id = 0u32;
    let mut state = 0x2545_F491u32;
    for _ in 0..count {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        id += 1 + (state >> 16) % 61;
        ids.push(id);
    }
    ids
}

#[test]
fn postings_roundtrip_350_docs_with_skips() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("seg-1");
    let doc_ids = increasing_doc_ids(350);
    let postings: Vec<DocPosting> = doc_ids
        .iter()
        .enumerate()
        .map(|(i, &id)| posting(id, &[(i % 7) as u32, (i % 7) as u32 + 3]))
        .collect();

    let mut writer = SegmentWriter::create(&dir).unwrap();
    writer.add_term("term", &postings).unwrap();
    writer.finish(1, 0, 350).unwrap();

    let segment = DiskSegment::open(&dir).unwrap();
    let list = segment.read_postings("term").unwrap().unwrap();
    assert_eq!(list.doc_ids, doc_ids);
    assert_eq!(
        list.term_freqs,
        postings.iter().map(|p| p.term_freq).collect::<Vec<_>>()
    );

    // 350 / 128 = 2 skip entries, referencing docIds[127] and docIds[255].
    assert_eq!(list.skips.len(), 2);
    assert_eq!(list.skips[0].doc_id, doc_ids[127]);
    assert_eq!(list.skips[1].doc_id, doc_ids[255]);
}

#[test]
fn skip_entries_match_raw_file_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("seg-1");
    let doc_ids = increasing_doc_ids(350);
    let postings: Vec<DocPosting> = doc_ids.iter().map(|&id| posting(id, &[0])).collect();

    let mut writer = SegmentWriter::create(&dir).unwrap();
    writer.add_term("term", &postings).unwrap();
    writer.finish(1, 0, 350).unwrap();

    // Walk the raw inv file by hand: header, then the posting list at the
    // dictionary's offset.
    let segment = DiskSegment::open(&dir).unwrap();
    let entry = *segment.dictionary().get("term").unwrap();
    let bytes = fs::read(dir.join(INV_FILE)).unwrap();
    let mut pos = entry.postings_offset as usize;

    let (doc_count, used) = codec::read_u32(&bytes[pos..]).unwrap();
    pos += used;
    assert_eq!(doc_count, 350);
    let (skip_count, used) = codec::read_u32(&bytes[pos..]).unwrap();
    pos += used;
    assert_eq!(skip_count, 2);

    // Recompute each skip target's delta offset independently.
    let mut expected_offsets = Vec::new();
    let mut delta_offset = 0u32;
    let mut prev = 0u32;
    for (k, &id) in doc_ids.iter().enumerate() {
        if (k + 1) % 128 == 0 {
            expected_offsets.push((id, delta_offset));
        }
        let delta = if k == 0 { id } else { id - prev };
        delta_offset += codec::encoded_len(u64::from(delta)) as u32;
        prev = id;
    }
    for &(skip_doc_id, skip_offset) in &expected_offsets {
        let raw_doc = u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap());
        let raw_off = u32::from_be_bytes(bytes[pos + 4..pos + 8].try_into().unwrap());
        assert_eq!(raw_doc, skip_doc_id);
        assert_eq!(raw_off, skip_offset);
        pos += 8;
    }
}

#[test]
fn crc_corruption_fails_open() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("seg-1");
    let mut writer = SegmentWriter::create(&dir).unwrap();
    writer.add_term("term", &[posting(1, &[0])]).unwrap();
    writer.finish(1, 0, 1).unwrap();
    assert!(DiskSegment::open(&dir).is_ok());

    // Flip one byte at offset 3 of the dictionary.
    let dict = dir.join(DICT_FILE);
    let mut bytes = fs::read(&dict).unwrap();
    bytes[3] ^= 0xFF;
    fs::write(&dict, bytes).unwrap();

    let err = DiskSegment::open(&dir).unwrap_err();
    assert!(matches!(err, rummage::Error::Format(_)));
    assert!(err.to_string().contains("CRC") || err.to_string().contains("magic"));
}

#[test]
fn dictionary_terms_ascending_and_counted() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("seg-1");
    let mut writer = SegmentWriter::create(&dir).unwrap();
    for term in ["alpha", "beta", "gamma", "延伸", "日本"] {
        writer.add_term(term, &[posting(1, &[0])]).unwrap();
    }
    writer.finish(1, 0, 1).unwrap();

    let segment = DiskSegment::open(&dir).unwrap();
    assert_eq!(segment.dictionary().len(), 5);
    let terms: Vec<&String> = segment.dictionary().iter().map(|(t, _)| t).collect();
    let mut sorted = terms.clone();
    sorted.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    assert_eq!(terms, sorted);
}

#[test]
fn targeted_position_read_matches_bulk() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("seg-1");
    let mut writer = SegmentWriter::create(&dir).unwrap();
    writer
        .add_term(
            "term",
            &[posting(2, &[1, 8]), posting(9, &[0]), posting(40, &[3, 4, 5])],
        )
        .unwrap();
    writer.finish(1, 0, 3).unwrap();

    let segment = DiskSegment::open(&dir).unwrap();
    let bulk = segment.read_positions("term").unwrap();
    for (doc_id, positions) in &bulk {
        assert_eq!(
            segment.positions_for_doc("term", *doc_id).unwrap().as_ref(),
            Some(positions)
        );
    }
    assert_eq!(segment.positions_for_doc("term", 3).unwrap(), None);
}
