//! Tokenizer invariants over arbitrary mixed-script input.

use proptest::prelude::*;
use rummage::tokenizer::Tokenizer;

/// Text mixing ASCII words, punctuation, and CJK runs.
fn mixed_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[a-zA-Z0-9]{0,8}",
            "[ \t\n.,;:!?()-]{0,4}",
            "[\u{4E00}-\u{4EFF}]{0,5}",
            "[\u{3040}-\u{309F}]{0,4}",
            "[\u{AC00}-\u{ACFF}]{0,4}",
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    /// Positions strictly increase; offsets are monotone, in-bounds, and
    /// consistent (start < end); terms are lowercase and never length 1
    /// for non-CJK runs.
    #[test]
    fn emitted_tokens_well_formed(text in mixed_text()) {
        let tokens = Tokenizer::new(false).tokenize(&text);
        let char_count = text.chars().count() as u32;
        let mut prev_position: Option<u32> = None;
        let mut prev_start = 0u32;

        for token in &tokens {
            // Globally monotone position, one step at a time.
            match prev_position {
                None => prop_assert_eq!(token.position, 0),
                Some(p) => prop_assert_eq!(token.position, p + 1),
            }
            prev_position = Some(token.position);

            // Offsets: ordered, non-decreasing across tokens, in bounds.
            prop_assert!(token.start < token.end);
            prop_assert!(token.end <= char_count);
            prop_assert!(token.start >= prev_start);
            prev_start = token.start;

            // Terms are already case-folded.
            prop_assert_eq!(token.term.clone(), token.term.to_lowercase());
            prop_assert!(!token.term.is_empty());
        }
    }

    /// The emitted term matches the input slice it claims to cover
    /// (modulo case folding).
    #[test]
    fn offsets_point_at_the_term(text in mixed_text()) {
        let chars: Vec<char> = text.chars().collect();
        for token in Tokenizer::new(false).tokenize(&text) {
            let slice: String = chars[token.start as usize..token.end as usize]
                .iter()
                .collect();
            prop_assert_eq!(slice.to_lowercase(), token.term);
        }
    }

    /// Stop-word filtering only ever removes tokens, never reorders.
    #[test]
    fn stop_filtering_is_a_subsequence(text in mixed_text()) {
        let all = Tokenizer::new(false).tokenize(&text);
        let filtered = Tokenizer::new(true).tokenize(&text);
        let mut all_terms = all.iter().map(|t| (&t.term, t.start));
        for token in &filtered {
            prop_assert!(
                all_terms.any(|(term, start)| term == &token.term && start == token.start)
            );
        }
    }
}
