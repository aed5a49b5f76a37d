//! Tests for aggregate descriptor construction and sub-query validation.

use tally::aggregate::{
    build_aggregate_descriptor, AggregateDescriptor, AggregateError, AggregateKind,
    SubQueryFeature,
};
use tally::query::{field, lit_bool, ExprExt, Query, SortField};
use tally::value::{Value, ValueType};

fn comment_sub_query() -> Query {
    Query::new("comment").with_filter(field("approved").eq(lit_bool(true)))
}

#[test]
fn builds_a_count_descriptor_with_kind_mappings() {
    let descriptor = AggregateDescriptor::build(
        "post",
        "comment_count",
        "count",
        "comments",
        comment_sub_query(),
    )
    .unwrap();

    assert_eq!(descriptor.resource, "post");
    assert_eq!(descriptor.name, "comment_count");
    assert_eq!(descriptor.kind, AggregateKind::Count);
    assert_eq!(descriptor.result_type, ValueType::Int);
    assert_eq!(descriptor.default_value, Value::Int(0));
    assert_eq!(descriptor.resolved_authorization_filter, None);
}

#[test]
fn single_hop_is_normalized_into_a_one_element_path() {
    let descriptor =
        AggregateDescriptor::build("post", "comment_count", "count", "comments", Query::new("comment"))
            .unwrap();
    assert_eq!(descriptor.relationship_path, vec!["comments".to_string()]);
}

#[test]
fn multi_hop_paths_are_kept_in_order() {
    let descriptor = AggregateDescriptor::build(
        "post",
        "rating_count",
        "count",
        ["comments", "ratings"],
        Query::new("rating"),
    )
    .unwrap();
    assert_eq!(
        descriptor.relationship_path,
        vec!["comments".to_string(), "ratings".to_string()]
    );
}

#[test]
fn construction_is_pure_and_deterministic() {
    let a = AggregateDescriptor::build("post", "comment_count", "count", "comments", comment_sub_query());
    let b = AggregateDescriptor::build("post", "comment_count", "count", "comments", comment_sub_query());
    assert_eq!(a, b);
}

#[test]
fn unknown_kind_is_rejected_with_the_offending_kind() {
    let err = AggregateDescriptor::build("post", "newest", "max", "comments", Query::new("comment"))
        .unwrap_err();
    assert_eq!(err, AggregateError::InvalidAggregateKind("max".into()));
}

#[test]
fn empty_relationship_path_is_rejected() {
    let err = AggregateDescriptor::build(
        "post",
        "comment_count",
        "count",
        Vec::<String>::new(),
        Query::new("comment"),
    )
    .unwrap_err();
    assert_eq!(err, AggregateError::EmptyRelationshipPath("comment_count".into()));
}

#[test]
fn sub_query_with_side_loads_is_rejected() {
    let sub_query = Query::new("comment").with_side_load("author");
    let err = AggregateDescriptor::build("post", "comment_count", "count", "comments", sub_query)
        .unwrap_err();
    assert_eq!(
        err,
        AggregateError::UnsupportedSubQueryFeature {
            name: "comment_count".into(),
            feature: SubQueryFeature::SideLoads,
        }
    );
}

#[test]
fn sub_query_with_nested_aggregates_is_rejected() {
    let nested = AggregateDescriptor::build("comment", "rating_count", "count", "ratings", Query::new("rating"))
        .unwrap();
    let sub_query = Query::new("comment").with_aggregate(nested);
    let err = AggregateDescriptor::build("post", "comment_count", "count", "comments", sub_query)
        .unwrap_err();
    assert!(matches!(
        err,
        AggregateError::UnsupportedSubQueryFeature {
            feature: SubQueryFeature::NestedAggregates,
            ..
        }
    ));
}

#[test]
fn sub_query_with_sort_is_rejected() {
    let sub_query = Query::new("comment").with_sort(SortField::asc("created_at"));
    let err = AggregateDescriptor::build("post", "comment_count", "count", "comments", sub_query)
        .unwrap_err();
    assert!(matches!(
        err,
        AggregateError::UnsupportedSubQueryFeature {
            feature: SubQueryFeature::Sort,
            ..
        }
    ));
}

#[test]
fn sub_query_with_limit_is_rejected() {
    let sub_query = Query::new("comment").with_limit(5);
    let err = build_aggregate_descriptor("post", "comment_count", "count", "comments", sub_query)
        .unwrap_err();
    assert_eq!(
        err,
        AggregateError::UnsupportedSubQueryFeature {
            name: "comment_count".into(),
            feature: SubQueryFeature::Limit,
        }
    );
}

#[test]
fn sub_query_with_nonzero_offset_is_rejected() {
    let sub_query = Query::new("comment").with_offset(10);
    let err = AggregateDescriptor::build("post", "comment_count", "count", "comments", sub_query)
        .unwrap_err();
    assert!(matches!(
        err,
        AggregateError::UnsupportedSubQueryFeature {
            feature: SubQueryFeature::Offset,
            ..
        }
    ));
}

#[test]
fn zero_offset_is_allowed() {
    let sub_query = Query::new("comment").with_offset(0);
    assert!(AggregateDescriptor::build("post", "comment_count", "count", "comments", sub_query).is_ok());
}

#[test]
fn first_violation_in_priority_order_wins() {
    // Sort and limit and offset all present: sort is reported first.
    let sub_query = Query::new("comment")
        .with_sort(SortField::desc("created_at"))
        .with_limit(5)
        .with_offset(10);
    let err = AggregateDescriptor::build("post", "comment_count", "count", "comments", sub_query)
        .unwrap_err();
    assert!(matches!(
        err,
        AggregateError::UnsupportedSubQueryFeature {
            feature: SubQueryFeature::Sort,
            ..
        }
    ));

    // Side-loads outrank everything.
    let sub_query = Query::new("comment")
        .with_side_load("author")
        .with_sort(SortField::desc("created_at"))
        .with_limit(5);
    let err = AggregateDescriptor::build("post", "comment_count", "count", "comments", sub_query)
        .unwrap_err();
    assert!(matches!(
        err,
        AggregateError::UnsupportedSubQueryFeature {
            feature: SubQueryFeature::SideLoads,
            ..
        }
    ));
}

#[test]
fn authorization_filter_is_conjoined_into_the_sub_query() {
    let descriptor = AggregateDescriptor::build(
        "post",
        "comment_count",
        "count",
        "comments",
        comment_sub_query(),
    )
    .unwrap();

    let auth = field("tenant").eq(tally::query::lit_str("acme"));
    let scoped = descriptor.with_authorization_filter(auth.clone());

    assert_eq!(scoped.resolved_authorization_filter, Some(auth.clone()));
    assert_eq!(
        scoped.sub_query.filter,
        Some(field("approved").eq(lit_bool(true)).and(auth))
    );
}
