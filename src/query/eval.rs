// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Query evaluation over a segment-set snapshot.
//!
//! Evaluation is per-segment set algebra: every AST node produces a
//! `docId → score` map restricted to one segment's live documents, and the
//! per-segment maps are union-merged (scores added on overlap) at the end.
//! Segments are independent, so the walk fans out across them with rayon.
//!
//! Global BM25 statistics are computed once, up front, against the same
//! snapshot — N and avgDL from the document table, df by scanning each
//! query term's posting lists and counting live documents. Simple and
//! always consistent; an incremental df map maintained at flush/merge time
//! is the known optimization if this ever shows up in profiles.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::DateTime;
use rayon::prelude::*;
use tracing::debug;

use crate::docstore::{DocStore, DocType};
use crate::error::Result;
use crate::query::{BoolOp, FieldKind, ParsedQuery, QueryNode, SortKey};
use crate::scoring::Bm25Stats;
use crate::segment::DiskSegment;

/// One ranked document coming out of evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: u32,
    pub score: f64,
}

/// Evaluate `parsed` over `segments`, rank, and truncate to `limit`.
pub fn execute(
    parsed: &ParsedQuery,
    segments: &[Arc<DiskSegment>],
    store: &DocStore,
    limit: usize,
) -> Result<Vec<ScoredDoc>> {
    let stats = global_stats(&parsed.root, segments, store)?;

    let maps: Vec<HashMap<u32, f64>> = segments
        .par_iter()
        .map(|segment| eval_node(&parsed.root, segment, store, &stats))
        .collect::<Result<Vec<_>>>()?;

    let mut merged: HashMap<u32, f64> = HashMap::new();
    for map in maps {
        for (doc_id, score) in map {
            *merged.entry(doc_id).or_insert(0.0) += score;
        }
    }
    debug!(candidates = merged.len(), "evaluated query over snapshot");

    let mut hits: Vec<ScoredDoc> = merged
        .into_iter()
        .map(|(doc_id, score)| ScoredDoc { doc_id, score })
        .collect();

    // Default order is score descending; a sort directive replaces the
    // primary key. Ties always break by ascending doc id.
    match parsed.sort.unwrap_or(SortKey::Score) {
        SortKey::Score => {
            hits.sort_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.doc_id.cmp(&b.doc_id))
            });
        }
        SortKey::Mtime => {
            hits.sort_by_key(|h| {
                let mtime = store.find_by_id(h.doc_id).map(|d| d.mtime_ms).unwrap_or(i64::MIN);
                (std::cmp::Reverse(mtime), h.doc_id)
            });
        }
        SortKey::Size => {
            hits.sort_by_key(|h| {
                let size = store.find_by_id(h.doc_id).map(|d| d.size_bytes).unwrap_or(0);
                (std::cmp::Reverse(size), h.doc_id)
            });
        }
    }
    hits.truncate(limit);
    Ok(hits)
}

// ============================================================================
// GLOBAL STATISTICS
// ============================================================================

/// Every concrete term the query will score: plain terms, phrase members,
/// and per-snapshot prefix expansions.
fn scored_terms(node: &QueryNode, segments: &[Arc<DiskSegment>], out: &mut BTreeSet<String>) {
    match node {
        QueryNode::Term(t) => {
            out.insert(t.clone());
        }
        QueryNode::Phrase(terms) => out.extend(terms.iter().cloned()),
        QueryNode::Prefix(prefix) => {
            for segment in segments {
                for (term, _) in segment.dictionary().prefix_scan(prefix) {
                    out.insert(term.clone());
                }
            }
        }
        QueryNode::Bool { left, right, .. } => {
            scored_terms(left, segments, out);
            scored_terms(right, segments, out);
        }
        QueryNode::Not(child) => scored_terms(child, segments, out),
        QueryNode::Field { .. } | QueryNode::Range { .. } => {}
    }
}

fn global_stats(
    node: &QueryNode,
    segments: &[Arc<DiskSegment>],
    store: &DocStore,
) -> Result<Bm25Stats> {
    let mut terms = BTreeSet::new();
    scored_terms(node, segments, &mut terms);

    let mut doc_freqs: HashMap<String, u32> = HashMap::new();
    for term in terms {
        let mut df = 0u32;
        for segment in segments {
            if let Some(list) = segment.read_postings(&term)? {
                df += list
                    .doc_ids
                    .iter()
                    .filter(|&&id| !segment.is_deleted(id) && store.contains_id(id))
                    .count() as u32;
            }
        }
        doc_freqs.insert(term, df);
    }
    Ok(Bm25Stats::new(
        store.total_doc_count(),
        store.average_doc_length(),
        doc_freqs,
    ))
}

// ============================================================================
// PER-SEGMENT EVALUATION
// ============================================================================

fn eval_node(
    node: &QueryNode,
    segment: &DiskSegment,
    store: &DocStore,
    stats: &Bm25Stats,
) -> Result<HashMap<u32, f64>> {
    match node {
        QueryNode::Term(term) => eval_term(term, segment, store, stats),
        QueryNode::Prefix(prefix) => {
            // Union of every matching term's map, scores added on overlap.
            let terms: Vec<String> = segment
                .dictionary()
                .prefix_scan(prefix)
                .map(|(t, _)| t.clone())
                .collect();
            let mut out = HashMap::new();
            for term in terms {
                for (doc_id, score) in eval_term(&term, segment, store, stats)? {
                    *out.entry(doc_id).or_insert(0.0) += score;
                }
            }
            Ok(out)
        }
        QueryNode::Phrase(terms) => eval_phrase(terms, segment, store, stats),
        QueryNode::Bool { op, left, right } => {
            let left = eval_node(left, segment, store, stats)?;
            let right = eval_node(right, segment, store, stats)?;
            Ok(match op {
                BoolOp::And => {
                    let mut out = HashMap::new();
                    for (doc_id, score) in left {
                        if let Some(other) = right.get(&doc_id) {
                            out.insert(doc_id, score + other);
                        }
                    }
                    out
                }
                BoolOp::Or => {
                    let mut out = left;
                    for (doc_id, score) in right {
                        *out.entry(doc_id).or_insert(0.0) += score;
                    }
                    out
                }
            })
        }
        QueryNode::Not(child) => {
            let excluded = eval_node(child, segment, store, stats)?;
            let mut out = HashMap::new();
            for &doc_id in segment.doc_ids()? {
                if !segment.is_deleted(doc_id)
                    && store.contains_id(doc_id)
                    && !excluded.contains_key(&doc_id)
                {
                    out.insert(doc_id, 0.0);
                }
            }
            Ok(out)
        }
        QueryNode::Field { field, value } => {
            let ids = field_doc_ids(*field, value, store);
            Ok(restrict_to_segment(ids, segment, store)?)
        }
        QueryNode::Range { field, low, high } => {
            let ids = range_doc_ids(*field, low, high, store);
            Ok(restrict_to_segment(ids, segment, store)?)
        }
    }
}

fn eval_term(
    term: &str,
    segment: &DiskSegment,
    store: &DocStore,
    stats: &Bm25Stats,
) -> Result<HashMap<u32, f64>> {
    let Some(list) = segment.read_postings(term)? else {
        return Ok(HashMap::new());
    };
    let mut out = HashMap::with_capacity(list.doc_ids.len());
    for (&doc_id, &tf) in list.doc_ids.iter().zip(&list.term_freqs) {
        if segment.is_deleted(doc_id) {
            continue;
        }
        let Some(doc) = store.find_by_id(doc_id) else {
            continue;
        };
        out.insert(doc_id, stats.score(term, tf, doc.token_count));
    }
    Ok(out)
}

/// Phrase matching: intersect the per-term candidate sets, then verify
/// adjacency against the positions file with targeted reads.
fn eval_phrase(
    terms: &[String],
    segment: &DiskSegment,
    store: &DocStore,
    stats: &Bm25Stats,
) -> Result<HashMap<u32, f64>> {
    if terms.is_empty() {
        return Ok(HashMap::new());
    }
    let term_maps: Vec<HashMap<u32, f64>> = terms
        .iter()
        .map(|t| eval_term(t, segment, store, stats))
        .collect::<Result<Vec<_>>>()?;

    // Candidates: docs holding every term; walk the smallest map.
    let Some(smallest) = term_maps.iter().min_by_key(|m| m.len()) else {
        return Ok(HashMap::new());
    };
    let candidates: Vec<u32> = smallest
        .keys()
        .copied()
        .filter(|id| term_maps.iter().all(|m| m.contains_key(id)))
        .collect();

    let mut out = HashMap::new();
    for doc_id in candidates {
        let mut positions = Vec::with_capacity(terms.len());
        let mut complete = true;
        for term in terms {
            match segment.positions_for_doc(term, doc_id)? {
                Some(p) => positions.push(p),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete || !has_adjacent_chain(&positions) {
            continue;
        }
        let score: f64 = term_maps.iter().map(|m| m[&doc_id]).sum();
        out.insert(doc_id, score);
    }
    Ok(out)
}

/// Does a start position `p` exist with `p+i` present in the i-th list?
fn has_adjacent_chain(positions: &[Vec<u32>]) -> bool {
    let Some(first) = positions.first() else {
        return false;
    };
    first.iter().any(|&p0| {
        positions
            .iter()
            .enumerate()
            .skip(1)
            .all(|(i, list)| list.binary_search(&(p0 + i as u32)).is_ok())
    })
}

/// Field and range results are boolean: matching live docs of this segment
/// at score 1.0.
fn restrict_to_segment(
    ids: Vec<u32>,
    segment: &DiskSegment,
    store: &DocStore,
) -> Result<HashMap<u32, f64>> {
    let universe = segment.doc_ids()?;
    Ok(ids
        .into_iter()
        .filter(|id| {
            universe.contains(id) && !segment.is_deleted(*id) && store.contains_id(*id)
        })
        .map(|id| (id, 1.0))
        .collect())
}

fn field_doc_ids(field: FieldKind, value: &str, store: &DocStore) -> Vec<u32> {
    match field {
        FieldKind::Path => store.find_doc_ids_by_path_prefix(value),
        FieldKind::Ext => store.find_doc_ids_by_extension(value),
        FieldKind::Filename => store.find_doc_ids_by_file_name(value),
        FieldKind::Type => match DocType::parse(value) {
            Some(t) => store.find_doc_ids_by_type(t),
            None => Vec::new(),
        },
        // A single size/mtime value matches exactly.
        FieldKind::Size => match value.parse::<u64>() {
            Ok(size) => store.find_doc_ids_by_size_range(size, size),
            Err(_) => Vec::new(),
        },
        FieldKind::Mtime => match parse_mtime(value) {
            Some(ms) => store.find_doc_ids_by_mtime_range(ms, ms),
            None => Vec::new(),
        },
    }
}

/// Malformed range literals yield an empty result set, not an error.
fn range_doc_ids(field: FieldKind, low: &str, high: &str, store: &DocStore) -> Vec<u32> {
    match field {
        FieldKind::Size => match (low.parse::<u64>(), high.parse::<u64>()) {
            (Ok(lo), Ok(hi)) => store.find_doc_ids_by_size_range(lo, hi),
            _ => Vec::new(),
        },
        FieldKind::Mtime => match (parse_mtime(low), parse_mtime(high)) {
            (Some(lo), Some(hi)) => store.find_doc_ids_by_mtime_range(lo, hi),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Accepts RFC 3339 timestamps or raw epoch milliseconds.
fn parse_mtime(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    value.parse::<i64>().ok()
}
