//! Property-based tests for frontmatter extraction
//!
//! Bodies, metadata blocks and separator layouts are generated at random to
//! cover inputs the example-based tests in `frontmatter.rs` don't reach.

use super::*;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

use crate::categories::default_table;
use crate::document::{ContentDocument, Destination, DocumentBuilder};
use crate::images::testing::FakeFetcher;
use crate::images::ImageResolver;
use crate::records::Record;
use crate::settings::RunConfig;

// Free text that never starts with a separator line once trimmed
fn plain_body_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,:#*_()\\n-]{0,200}".prop_filter("starts with a separator", |body| {
        !is_separator(body.trim().lines().next().unwrap_or("")) && !body.contains("DOWNLOAD(")
    })
}

// Scalars that read back as the same JSON value
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z]{1,10}( [a-z]{1,10}){1,3}".prop_map(Value::String),
        (-1000i64..1000).prop_map(|n| json!(n)),
        any::<bool>().prop_map(Value::Bool),
    ]
}

fn metadata_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("k_[a-z]{1,8}", value_strategy(), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}

// Lines without dashes, so none of them reads as a separator
fn body_lines_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9 .,]{0,30}", 0..6).prop_map(|lines| lines.join("\n"))
}

fn build_body(content: &str) -> String {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let resolver = ImageResolver::new(Arc::new(FakeFetcher::new()));
        let config = RunConfig::default();
        let table = default_table();
        let record = Record::new()
            .with("name", "Post")
            .with("published", true)
            .with("content", content);
        DocumentBuilder::new(&resolver, &config)
            .build("articles", record, &table["articles"])
            .await
            .unwrap()
            .document
            .body
    })
}

// Property 1: content without a leading separator has no frontmatter and
// passes through the builder byte for byte
proptest! {
    #[test]
    fn prop_plain_body_is_untouched(body in plain_body_strategy()) {
        prop_assert_eq!(extract(&body), Ok(None));
        prop_assert_eq!(build_body(&body), body);
    }
}

// Property 2: a rendered document extracts back to its metadata and body
proptest! {
    #[test]
    fn prop_rendered_document_extracts_back(
        metadata in metadata_strategy(),
        body in body_lines_strategy(),
    ) {
        let doc = ContentDocument {
            destination: Destination::Normal,
            dir: "news".into(),
            filename: "post".into(),
            metadata: metadata.clone(),
            body: body.clone(),
        };

        let block = extract(&doc.render().unwrap()).unwrap().unwrap();

        prop_assert_eq!(block.metadata, metadata);
        prop_assert_eq!(block.body.trim(), body.trim());
    }
}

// Property 3: anything but exactly two separators is rejected with the count
proptest! {
    #[test]
    fn prop_wrong_separator_count_is_reported(
        separators in prop::collection::vec("-{3,8}", 1..7),
        filler in "[a-z]{1,10}: [a-z]{1,10}",
    ) {
        prop_assume!(separators.len() != 2);
        let raw = separators
            .iter()
            .map(|sep| format!("{}\n{}", sep, filler))
            .collect::<Vec<_>>()
            .join("\n");

        prop_assert_eq!(
            extract(&raw),
            Err(FrontmatterError::SeparatorCount { found: separators.len() })
        );
    }
}
