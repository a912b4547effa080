//! Query semantics against an indexed corpus.

use crate::common::{hit_paths, set_mtime, Fixture};
use rummage::scoring::Bm25Stats;

#[test]
fn phrase_requires_adjacent_positions() {
    let fx = Fixture::new();
    fx.write("d1.txt", "the quick brown fox");
    fx.write("d2.txt", "quick fox brown");
    let manager = fx.indexed();

    let hits = manager.search("\"quick brown\"", 10).unwrap();
    assert_eq!(hit_paths(&hits), vec!["d1.txt"]);

    // Both documents contain both words, so plain AND matches both.
    let hits = manager.search("quick brown", 10).unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn boolean_and_narrows_and_scores_add() {
    let fx = Fixture::new();
    fx.write("d1.txt", "Java programming");
    fx.write("d2.txt", "Java tutorial");
    fx.write("d3.txt", "Python programming");
    let manager = fx.indexed();

    let hits = manager.search("Java AND programming", 10).unwrap();
    assert_eq!(hit_paths(&hits), vec!["d1.txt"]);

    // Expected score: bm25(java, d1) + bm25(programming, d1) with
    // N = 3, avgDL = 2, df(java) = df(programming) = 2, tf = 1, |d1| = 2.
    let stats = Bm25Stats::new(
        3,
        2.0,
        [("java".to_string(), 2), ("programming".to_string(), 2)]
            .into_iter()
            .collect(),
    );
    let expected = stats.score("java", 1, 2) + stats.score("programming", 1, 2);
    assert!((hits[0].score - expected).abs() < 1e-9);
}

#[test]
fn or_unions_and_not_excludes() {
    let fx = Fixture::new();
    fx.write("a.txt", "alpha only");
    fx.write("b.txt", "beta only");
    fx.write("c.txt", "alpha beta");
    let manager = fx.indexed();

    assert_eq!(manager.search("alpha OR beta", 10).unwrap().len(), 3);
    let hits = manager.search("alpha NOT beta", 10).unwrap();
    assert_eq!(hit_paths(&hits), vec!["a.txt"]);
    let hits = manager.search("alpha -beta", 10).unwrap();
    assert_eq!(hit_paths(&hits), vec!["a.txt"]);
}

#[test]
fn prefix_query_unions_matching_terms() {
    let fx = Fixture::new();
    fx.write("a.txt", "indexing pipeline");
    fx.write("b.txt", "indexed corpus");
    fx.write("c.txt", "unrelated words");
    let manager = fx.indexed();

    let hits = manager.search("index*", 10).unwrap();
    let mut paths = hit_paths(&hits);
    paths.sort();
    assert_eq!(paths, vec!["a.txt", "b.txt"]);
}

#[test]
fn cjk_phrase_matching_via_bigrams() {
    let fx = Fixture::new();
    fx.write("ja.txt", "全文検索エンジン");
    fx.write("other.txt", "検索だけ");
    let manager = fx.indexed();

    let hits = manager.search("全文検索", 10).unwrap();
    assert_eq!(hit_paths(&hits), vec!["ja.txt"]);
    // A single bigram matches both documents.
    assert_eq!(manager.search("検索", 10).unwrap().len(), 2);
}

#[test]
fn size_and_mtime_ranges() {
    let fx = Fixture::new();
    let a = fx.write("a.md", "abc 12"); // 6 bytes
    let b = fx.write("b.md", "abcdefghij 4567890"); // 18 bytes
    // Pin mtimes into 2025.
    set_mtime(&a, 1_735_689_600); // 2025-01-01T00:00:00Z
    set_mtime(&b, 1_750_000_000); // mid-2025
    let manager = fx.indexed();

    let hits = manager.search("size:1..20", 10).unwrap();
    assert_eq!(hits.len(), 2);

    let hits = manager
        .search(
            "mtime:\"2025-01-01T00:00:00Z\"..\"2025-12-31T00:00:00Z\"",
            10,
        )
        .unwrap();
    assert_eq!(hits.len(), 2);

    // Malformed range literals yield empty results, not errors.
    assert!(manager.search("size:abc..def", 10).unwrap().is_empty());
    assert!(manager.search("mtime:xx..yy", 10).unwrap().is_empty());
}

#[test]
fn field_queries_consult_the_doc_table() {
    let fx = Fixture::new();
    fx.write("readme.md", "hello docs");
    fx.write("main.rs", "hello code");
    let manager = fx.indexed();

    assert_eq!(
        hit_paths(&manager.search("ext:md", 10).unwrap()),
        vec!["readme.md"]
    );
    assert_eq!(
        hit_paths(&manager.search("type:code", 10).unwrap()),
        vec!["main.rs"]
    );
    assert_eq!(
        hit_paths(&manager.search("readme.md", 10).unwrap()),
        vec!["readme.md"]
    );
    assert_eq!(
        hit_paths(&manager.search("hello AND ext:rs", 10).unwrap()),
        vec!["main.rs"]
    );
}

#[test]
fn sort_directives_replace_primary_key() {
    let fx = Fixture::new();
    let old = fx.write("old.txt", "shared term plus padding padding");
    let new = fx.write("new.txt", "shared term");
    set_mtime(&old, 1_600_000_000);
    set_mtime(&new, 1_700_000_000);
    let manager = fx.indexed();

    let hits = manager.search("shared sort:mtime", 10).unwrap();
    assert_eq!(hit_paths(&hits), vec!["new.txt", "old.txt"]);

    let hits = manager.search("shared sort:size", 10).unwrap();
    assert_eq!(hit_paths(&hits), vec!["old.txt", "new.txt"]);
}

#[test]
fn limit_truncates_ranked_results() {
    let fx = Fixture::new();
    for i in 0..8 {
        fx.write(&format!("f{i}.txt"), "needle haystack");
    }
    let manager = fx.indexed();
    assert_eq!(manager.search("needle", 3).unwrap().len(), 3);
    assert_eq!(manager.search("needle", 0).unwrap().len(), 0);
}

#[test]
fn snippets_attached_to_hits() {
    let fx = Fixture::new();
    fx.write(
        "doc.md",
        "first line\nsecond line mentions the needle here\nthird line\n",
    );
    let manager = fx.indexed();
    let hits = manager.search("needle", 10).unwrap();
    assert_eq!(hits.len(), 1);
    let snippet = &hits[0].snippets[0];
    assert!(snippet.text.contains("needle"));
    assert_eq!(snippet.line, 2);
    assert!(!snippet.highlights.is_empty());
}

#[test]
fn oversized_query_rejected() {
    let fx = Fixture::new();
    fx.write("a.txt", "content");
    let manager = fx.indexed();
    let long = "term ".repeat(600);
    assert!(matches!(
        manager.search(&long, 10),
        Err(rummage::Error::Validation(_))
    ));
}
