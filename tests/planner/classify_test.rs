//! Tests for in-query vs needs-fetch classification.

#[allow(dead_code)]
mod support;

use support::blog_schema;
use tally::aggregate::AggregateDescriptor;
use tally::plan::classify;
use tally::query::{aggregate_ref, lit_int, ExprExt, Query, SortField};

fn comment_count() -> AggregateDescriptor {
    AggregateDescriptor::build("post", "comment_count", "count", "comments", Query::new("comment"))
        .unwrap()
}

fn trending_count() -> AggregateDescriptor {
    AggregateDescriptor::build(
        "post",
        "trending_count",
        "count",
        "trending_comments",
        Query::new("comment"),
    )
    .unwrap()
}

#[test]
fn reverse_relationship_and_no_back_reference_means_needs_fetch() {
    let schema = blog_schema();
    let query = Query::new("post").with_aggregate(comment_count());

    let classification = classify(&schema, &query, &["comments".to_string()]).unwrap();

    assert!(!classification.in_query);
    let reverse = classification.reverse.unwrap();
    assert_eq!(reverse.path, vec!["post".to_string()]);
    assert_eq!(reverse.related, "comment");
}

#[test]
fn missing_reverse_relationship_forces_in_query() {
    let schema = blog_schema();
    let query = Query::new("post").with_aggregate(trending_count());

    let classification = classify(&schema, &query, &["trending_comments".to_string()]).unwrap();

    assert!(classification.in_query);
    assert!(classification.reverse.is_none());
}

#[test]
fn aggregate_referenced_in_the_filter_forces_in_query() {
    let schema = blog_schema();
    let query = Query::new("post")
        .with_aggregate(comment_count())
        .with_filter(aggregate_ref("comment_count").gt(lit_int(10)));

    let classification = classify(&schema, &query, &["comments".to_string()]).unwrap();

    // The reverse relationship exists, but fetching separately would double
    // the computation the primary query already does.
    assert!(classification.in_query);
    assert!(classification.reverse.is_some());
}

#[test]
fn sort_key_mapping_to_an_aggregate_of_this_path_forces_in_query() {
    let schema = blog_schema();
    let query = Query::new("post")
        .with_aggregate(comment_count())
        .with_sort(SortField::desc("comment_count"));

    let classification = classify(&schema, &query, &["comments".to_string()]).unwrap();

    assert!(classification.in_query);
}

#[test]
fn sort_key_of_an_aggregate_with_a_different_path_does_not_fold_this_one() {
    let schema = blog_schema();
    let query = Query::new("post")
        .with_aggregate(comment_count())
        .with_aggregate(trending_count())
        .with_sort(SortField::desc("trending_count"));

    let classification = classify(&schema, &query, &["comments".to_string()]).unwrap();

    assert!(!classification.in_query);
}

#[test]
fn sort_key_naming_a_plain_field_does_not_fold() {
    let schema = blog_schema();
    let query = Query::new("post")
        .with_aggregate(comment_count())
        .with_sort(SortField::asc("title"));

    let classification = classify(&schema, &query, &["comments".to_string()]).unwrap();

    assert!(!classification.in_query);
}
