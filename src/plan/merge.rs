//! The value-fetch computation: re-scope, push down, execute, merge.
//!
//! Runs once the primary query's rows (and the path's authorization filter,
//! when one was requested) are stored. Issues at most one physical query:
//! the primary query stripped of its filter/sort/aggregate state, re-scoped
//! to exactly the fetched rows by primary key, with every aggregate in the
//! group pushed down into it.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::aggregate::AggregateDescriptor;
use crate::data::{DataLayer, Row};
use crate::query::{and_all, field, or_all, Expr, ExprExt, Query};
use crate::value::Value;

use super::unit::{AggregateValues, ResultStore, UnitComputation, UnitOutput, UnitPath};
use super::PlanResult;

/// Computation body of a value-fetch unit.
pub struct ValueFetchComputation {
    pub(super) data_layer: Arc<dyn DataLayer>,
    pub(super) primary_query: Query,
    pub(super) primary_key: Vec<String>,
    pub(super) aggregates: Vec<AggregateDescriptor>,
    /// Where this path's authorization filter is stored, when authorizing.
    pub(super) authorization_path: Option<UnitPath>,
}

#[async_trait]
impl UnitComputation for ValueFetchComputation {
    async fn run(&self, store: &ResultStore) -> PlanResult<UnitOutput> {
        let rows = store.rows(&UnitPath::QueryRows)?;

        // Nothing fetched means nothing to aggregate onto. No query issued.
        if rows.is_empty() {
            return Ok(UnitOutput::AggregateValues(AggregateValues::new()));
        }

        let authorization_filter = match &self.authorization_path {
            Some(path) => store.filter(path)?.cloned(),
            None => None,
        };

        let values = self.run_aggregate_query(rows, authorization_filter).await?;
        Ok(UnitOutput::AggregateValues(values))
    }
}

impl ValueFetchComputation {
    async fn run_aggregate_query(
        &self,
        rows: &[Row],
        authorization_filter: Option<Expr>,
    ) -> PlanResult<AggregateValues> {
        let resource = &self.primary_query.resource;

        let mut fetch = self.primary_query.clone().without_query_state();
        if let Some(filter) = primary_key_filter(&self.primary_key, rows) {
            fetch = fetch.with_filter(filter);
        }

        // First pushdown failure aborts the whole unit: no partial results
        // for the group.
        for aggregate in &self.aggregates {
            let aggregate = match &authorization_filter {
                Some(filter) => aggregate.clone().with_authorization_filter(filter.clone()),
                None => aggregate.clone(),
            };
            fetch = self.data_layer.add_aggregate(fetch, &aggregate, resource)?;
        }

        let results = self.data_layer.run_query(&fetch, resource).await?;

        let requested: HashSet<&str> = self.aggregates.iter().map(|a| a.name.as_str()).collect();
        Ok(results
            .into_iter()
            .map(|row| {
                let key = row.key(&self.primary_key);
                // Restrict to the names requested in this group, whatever
                // else the data layer tacked on.
                let values: HashMap<String, _> = row
                    .aggregates
                    .into_iter()
                    .filter(|(name, _)| requested.contains(name.as_str()))
                    .collect();
                (key, values)
            })
            .collect())
    }
}

/// The re-scoping filter: an exact primary-key-tuple match for one row, a
/// disjunction of tuple matches for several.
pub fn primary_key_filter(primary_key: &[String], rows: &[Row]) -> Option<Expr> {
    or_all(rows.iter().filter_map(|row| {
        and_all(primary_key.iter().map(|pk_field| {
            let value = row.fields.get(pk_field).cloned().unwrap_or(Value::Null);
            field(pk_field).eq(Expr::Literal(value))
        }))
    }))
}
