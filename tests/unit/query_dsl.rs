//! Query DSL end-to-end: lexing, parsing, rewrites, and error surfaces.

use rummage::error::Error;
use rummage::query::{parse, parse_with_options, BoolOp, FieldKind, QueryNode, SortKey};

#[test]
fn full_query_shape() {
    let parsed = parse("(\"inverted index\" OR postings) ext:md NOT draft sort:mtime").unwrap();
    assert_eq!(parsed.sort, Some(SortKey::Mtime));
    // ((phrase OR term) AND field) AND (NOT term)
    let QueryNode::Bool { op: BoolOp::And, left, right } = parsed.root else {
        panic!("expected top-level AND");
    };
    assert!(matches!(*right, QueryNode::Not(_)));
    let QueryNode::Bool { op: BoolOp::And, left: group, right: field } = *left else {
        panic!("expected nested AND");
    };
    assert!(matches!(*group, QueryNode::Bool { op: BoolOp::Or, .. }));
    assert_eq!(
        *field,
        QueryNode::Field {
            field: FieldKind::Ext,
            value: "md".to_string()
        }
    );
}

#[test]
fn bare_filename_convenience() {
    assert_eq!(
        parse("notes.md").unwrap().root,
        QueryNode::Field {
            field: FieldKind::Filename,
            value: "notes.md".to_string()
        }
    );
    // Disabled: the same input tokenizes into a phrase over its words.
    assert_eq!(
        parse_with_options("notes.md", false).unwrap().root,
        QueryNode::Phrase(vec!["notes".to_string(), "md".to_string()])
    );
}

#[test]
fn name_aliases_filename() {
    assert_eq!(
        parse("name:todo.txt").unwrap().root,
        QueryNode::Field {
            field: FieldKind::Filename,
            value: "todo.txt".to_string()
        }
    );
}

#[test]
fn ranges_parse_for_size_and_mtime_only() {
    assert!(matches!(
        parse("size:1..20").unwrap().root,
        QueryNode::Range { field: FieldKind::Size, .. }
    ));
    assert!(matches!(
        parse("mtime:100..200").unwrap().root,
        QueryNode::Range { field: FieldKind::Mtime, .. }
    ));
    assert!(parse("path:a..b").is_err());
    assert!(parse("type:a..b").is_err());
}

#[test]
fn unterminated_quote_error_is_actionable() {
    let Err(Error::QueryParse(e)) = parse("hello \"worl") else {
        panic!("expected a parse error");
    };
    assert_eq!(e.position, 6);
    assert!(e.message.contains("unterminated"));
    assert!(e.hint.contains('"'));
    let rendered = e.render();
    assert!(rendered.contains("hello \"worl"));
    assert!(rendered.lines().any(|l| l.trim_end().ends_with('^')));
}

#[test]
fn unknown_field_lists_known_ones() {
    let Err(Error::QueryParse(e)) = parse("author:me") else {
        panic!("expected a parse error");
    };
    assert!(e.message.contains("author"));
    assert!(e.hint.contains("filename"));
}

#[test]
fn sort_rejected_mid_query() {
    let Err(Error::QueryParse(e)) = parse("sort:mtime rust") else {
        panic!("expected a parse error");
    };
    assert!(e.message.contains("sort"));
}

#[test]
fn escaped_quotes_inside_phrase() {
    assert_eq!(
        parse(r#""say \"hello\" twice""#).unwrap().root,
        QueryNode::Phrase(vec![
            "say".to_string(),
            "hello".to_string(),
            "twice".to_string()
        ])
    );
}

#[test]
fn implicit_and_explicit_and_equivalent() {
    assert_eq!(
        parse("alpha beta").unwrap(),
        parse("alpha AND beta").unwrap()
    );
}
