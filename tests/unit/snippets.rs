//! Snippet synthesis over realistic document text.

use rummage::snippet::{generate, MAX_SNIPPETS};

const DOC: &str = "\
# Inverted indexes

An inverted index maps terms to the documents containing them.
Postings lists are delta encoded; positions make phrase queries work.

## Skip lists

Long postings lists carry skip entries so a reader can jump ahead
without decoding everything before the target document.
";

#[test]
fn snippet_carries_line_number_and_offsets() {
    let snippets = generate(DOC, ["postings"]);
    assert!(!snippets.is_empty());
    let first = &snippets[0];
    // The first occurrence of "postings" sits on line 4 of the document,
    // and the line number anchors on the hit, not the context window.
    assert_eq!(first.line, 4);
    let chars: Vec<char> = DOC.chars().collect();
    let window: String = chars[first.start_offset as usize..].iter().collect();
    assert!(window.starts_with(first.text.as_str()));
}

#[test]
fn highlights_are_snippet_relative() {
    let snippets = generate(DOC, ["delta"]);
    let s = &snippets[0];
    for h in &s.highlights {
        let text: Vec<char> = s.text.chars().collect();
        let span: String = text[h.start as usize..h.end as usize].iter().collect();
        assert_eq!(span.to_ascii_lowercase(), "delta");
    }
}

#[test]
fn multiple_terms_highlighted_in_one_window() {
    let snippets = generate("alpha beta gamma delta", ["alpha", "delta"]);
    assert_eq!(snippets.len(), 1);
    assert_eq!(snippets[0].highlights.len(), 2);
}

#[test]
fn respects_snippet_cap() {
    let spacer = "x ".repeat(300);
    let doc: String = (0..10).map(|i| format!("match {i} {spacer}\n")).collect();
    assert_eq!(generate(&doc, ["match"]).len(), MAX_SNIPPETS);
}

#[test]
fn empty_terms_produce_nothing() {
    assert!(generate(DOC, std::iter::empty::<&str>()).is_empty());
}
