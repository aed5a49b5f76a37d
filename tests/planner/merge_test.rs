//! Tests for the value-fetch computation: re-scoping, pushdown, merging.

#[allow(dead_code)]
mod support;

use std::sync::Arc;

use support::{blog_schema, RecordingDataLayer, StaticAuthorizer};
use tally::aggregate::AggregateDescriptor;
use tally::data::Row;
use tally::plan::{
    AggregatePlanner, PlanError, ResultStore, UnitComputation, UnitOutput, UnitPath, WorkUnit,
};
use tally::query::{field, lit_bool, lit_int, lit_str, ExprExt, Query, SortField};
use tally::value::KeyTuple;

fn comment_count() -> AggregateDescriptor {
    AggregateDescriptor::build(
        "post",
        "comment_count",
        "count",
        "comments",
        Query::new("comment").with_filter(field("approved").eq(lit_bool(true))),
    )
    .unwrap()
}

fn primary_query() -> Query {
    Query::new("post")
        .with_filter(field("published").eq(lit_bool(true)))
        .with_sort(SortField::asc("title"))
        .with_aggregate(comment_count())
}

fn fetch_unit(data_layer: Arc<RecordingDataLayer>, authorizing: bool) -> WorkUnit {
    let planner = AggregatePlanner::new(Arc::new(blog_schema()), data_layer)
        .with_authorizer(Arc::new(StaticAuthorizer::granting(None)));
    let plan = planner.plan(&primary_query(), authorizing).unwrap();
    plan.value_fetch_units
        .into_iter()
        .next()
        .expect("a fetch unit for the comments path")
}

fn rows_store(rows: Vec<Row>) -> ResultStore {
    let mut store = ResultStore::new();
    store
        .insert(UnitPath::QueryRows, UnitOutput::Rows(rows))
        .unwrap();
    store
}

#[tokio::test]
async fn zero_primary_rows_short_circuits_without_a_query() {
    let data_layer = Arc::new(RecordingDataLayer::empty());
    let unit = fetch_unit(Arc::clone(&data_layer), false);

    let output = unit.computation.run(&rows_store(vec![])).await.unwrap();

    match output {
        UnitOutput::AggregateValues(values) => assert!(values.is_empty()),
        other => panic!("expected aggregate values, got {:?}", other),
    }
    assert_eq!(data_layer.run_count(), 0);
}

#[tokio::test]
async fn one_primary_row_rescopes_with_an_exact_key_match() {
    let data_layer = Arc::new(RecordingDataLayer::empty());
    let unit = fetch_unit(Arc::clone(&data_layer), false);

    let rows = vec![Row::new().with_field("id", 1)];
    unit.computation.run(&rows_store(rows)).await.unwrap();

    let issued = data_layer.last_query().unwrap();
    assert_eq!(issued.resource, "post");
    assert_eq!(issued.filter, Some(field("id").eq(lit_int(1))));
    // Filter/sort state from the primary query must not leak into the fetch.
    assert!(issued.sort.is_empty());
}

#[tokio::test]
async fn several_primary_rows_rescope_with_a_disjunction() {
    let data_layer = Arc::new(RecordingDataLayer::empty());
    let unit = fetch_unit(Arc::clone(&data_layer), false);

    let rows = vec![
        Row::new().with_field("id", 1),
        Row::new().with_field("id", 2),
    ];
    unit.computation.run(&rows_store(rows)).await.unwrap();

    let issued = data_layer.last_query().unwrap();
    assert_eq!(
        issued.filter,
        Some(field("id").eq(lit_int(1)).or(field("id").eq(lit_int(2))))
    );
}

#[tokio::test]
async fn pagination_from_the_primary_query_does_not_leak_into_the_fetch() {
    let data_layer = Arc::new(RecordingDataLayer::empty());
    let planner = AggregatePlanner::new(Arc::new(blog_schema()), data_layer.clone());
    let query = primary_query()
        .with_limit(2)
        .with_offset(10)
        .with_side_load("comments");
    let plan = planner.plan(&query, false).unwrap();
    let unit = plan.value_fetch_units.into_iter().next().unwrap();

    let rows = vec![Row::new().with_field("id", 11)];
    unit.computation.run(&rows_store(rows)).await.unwrap();

    let issued = data_layer.last_query().unwrap();
    assert_eq!(issued.limit, None);
    assert_eq!(issued.offset, 0, "a carried offset would skip the re-scoped rows");
    assert!(issued.side_loads.is_empty());
    assert_eq!(issued.filter, Some(field("id").eq(lit_int(11))));
}

#[tokio::test]
async fn authorization_filter_is_conjoined_into_every_pushed_sub_query() {
    let data_layer = Arc::new(RecordingDataLayer::empty());
    let unit = fetch_unit(Arc::clone(&data_layer), true);

    let auth_filter = field("tenant").eq(lit_str("acme"));
    let mut store = rows_store(vec![Row::new().with_field("id", 1)]);
    store
        .insert(
            UnitPath::Authorization(vec!["comments".into()]),
            UnitOutput::Filter(Some(auth_filter.clone())),
        )
        .unwrap();

    unit.computation.run(&store).await.unwrap();

    let pushed = data_layer.added_aggregates();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].resolved_authorization_filter, Some(auth_filter.clone()));
    assert_eq!(
        pushed[0].sub_query.filter,
        Some(field("approved").eq(lit_bool(true)).and(auth_filter))
    );
}

#[tokio::test]
async fn output_is_keyed_by_primary_key_tuple_and_restricted_to_requested_names() {
    let results = vec![
        Row::new()
            .with_field("id", 1)
            .with_aggregate("comment_count", 3)
            .with_aggregate("internal_total", 99),
        Row::new()
            .with_field("id", 2)
            .with_aggregate("comment_count", 0),
    ];
    let data_layer = Arc::new(RecordingDataLayer::returning(results));
    let unit = fetch_unit(Arc::clone(&data_layer), false);

    let rows = vec![
        Row::new().with_field("id", 1),
        Row::new().with_field("id", 2),
    ];
    let output = unit.computation.run(&rows_store(rows)).await.unwrap();

    let UnitOutput::AggregateValues(values) = output else {
        panic!("expected aggregate values");
    };
    assert_eq!(values.len(), 2);

    let first = &values[&KeyTuple::new().with("id", 1)];
    assert_eq!(first.len(), 1, "extra data-layer fields must be dropped");
    assert_eq!(first["comment_count"], 3.into());

    let second = &values[&KeyTuple::new().with("id", 2)];
    assert_eq!(second["comment_count"], 0.into());
}

#[tokio::test]
async fn pushdown_failure_aborts_the_unit_before_execution() {
    let data_layer =
        Arc::new(RecordingDataLayer::empty().failing_pushdown_for("comment_count"));
    let unit = fetch_unit(Arc::clone(&data_layer), false);

    let err = unit
        .computation
        .run(&rows_store(vec![Row::new().with_field("id", 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlanError::DataLayerPushdownFailed { ref aggregate, .. } if aggregate == "comment_count"
    ));
    assert_eq!(data_layer.run_count(), 0, "no partial pushdown may execute");
}

#[tokio::test]
async fn execution_failure_propagates_as_the_unit_failure() {
    let data_layer = Arc::new(RecordingDataLayer::empty().failing_execution());
    let unit = fetch_unit(Arc::clone(&data_layer), false);

    let err = unit
        .computation
        .run(&rows_store(vec![Row::new().with_field("id", 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlanError::DataLayerExecutionFailed { ref resource, .. } if resource == "post"
    ));
}
