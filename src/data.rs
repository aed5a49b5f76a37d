//! Data layer contract.
//!
//! The physical storage backend is abstracted behind [`DataLayer`]: it must
//! know how to fold an aggregate into a query (pushdown) and how to execute
//! a composed query into rows. The planner only uses this contract; tests
//! and embedders supply implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::aggregate::AggregateDescriptor;
use crate::query::Query;
use crate::value::{KeyTuple, Value};

/// Result type for data-layer operations.
pub type DataResult<T> = Result<T, DataLayerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataLayerError {
    /// The data layer cannot express an aggregate in its physical query
    /// representation.
    #[error("cannot push aggregate {aggregate:?} into the data layer: {reason}")]
    Pushdown { aggregate: String, reason: String },

    /// Query execution failed.
    #[error("query execution failed on {resource:?}: {reason}")]
    Execution { resource: String, reason: String },
}

/// A fetched row: plain field values plus any computed aggregate values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub fields: BTreeMap<String, Value>,
    pub aggregates: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_aggregate(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.aggregates.insert(name.into(), value.into());
        self
    }

    /// The primary-key tuple of this row. Missing fields key as `Null`.
    pub fn key(&self, primary_key: &[String]) -> KeyTuple {
        primary_key
            .iter()
            .map(|field| {
                let value = self.fields.get(field).cloned().unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect()
    }
}

/// The physical storage execution backend.
#[async_trait]
pub trait DataLayer: Send + Sync {
    /// Fold an aggregate computation into the physical query representation.
    fn add_aggregate(
        &self,
        query: Query,
        aggregate: &AggregateDescriptor,
        resource: &str,
    ) -> DataResult<Query>;

    /// Execute a composed query and fetch its rows.
    async fn run_query(&self, query: &Query, resource: &str) -> DataResult<Vec<Row>>;
}
