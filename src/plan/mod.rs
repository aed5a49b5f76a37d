//! Aggregate planning - turns a query's aggregates into work units.
//!
//! Three-phase pass over the aggregates attached to a primary query:
//! 1. Grouping: partition descriptors by exact relationship path.
//! 2. Classification: per group, in-query fold vs independent fetch.
//! 3. Emission: per group, at most one authorization unit and one
//!    value-fetch unit, with dependencies declared against the shared
//!    result store.
//!
//! The emitted units are handed to a scheduler (see [`crate::engine`] for
//! the in-crate one), which supplies the runtime inputs: the primary
//! query's actual filter, its fetched rows, and each path's authorization
//! filter.

mod assemble;
mod build;
mod classify;
mod group;
mod merge;
pub mod unit;

pub use assemble::assemble_related_query;
pub use classify::{classify, Classification};
pub use group::group_by_path;
pub use merge::{primary_key_filter, ValueFetchComputation};
pub use unit::{
    AggregateValues, Deferred, ResultStore, UnitComputation, UnitOutput, UnitPath, WorkUnit,
};

use std::sync::Arc;
use thiserror::Error;

use crate::aggregate::{AggregateDescriptor, AggregateError};
use crate::authorize::{AllowAll, AuthorizationError, Authorizer};
use crate::data::{DataLayer, DataLayerError};
use crate::query::Query;
use crate::schema::{Schema, SchemaError};

/// Errors that can occur during planning or unit evaluation.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// The data layer cannot express an aggregate. Aborts the whole
    /// value-fetch unit; no partial results for the group.
    #[error("cannot push aggregate {aggregate:?} into the data layer: {reason}")]
    DataLayerPushdownFailed { aggregate: String, reason: String },

    /// Physical query execution failed. Aborts the unit.
    #[error("query execution failed on {resource:?}: {reason}")]
    DataLayerExecutionFailed { resource: String, reason: String },

    /// A needs-fetch path cannot be re-scoped without primary-key fields.
    #[error("resource {resource:?} has no primary key to re-scope a fetch by")]
    MissingPrimaryKey { resource: String },

    /// A computation read a store path with no stored value.
    #[error("no value stored at {0}")]
    MissingDependency(UnitPath),

    /// A computation read a store path holding the wrong kind of value.
    #[error("value at {path} is {found}, expected {expected}")]
    WrongOutputKind {
        path: UnitPath,
        expected: &'static str,
        found: &'static str,
    },

    /// A second write to an already-stored path.
    #[error("result already stored at {0}")]
    DuplicateResult(UnitPath),

    /// Two units were registered under one store path.
    #[error("duplicate work unit at {0}")]
    DuplicateUnitPath(UnitPath),

    /// The declared dependencies form a cycle; nothing can run.
    #[error("work units form a dependency cycle")]
    DependencyCycle,
}

impl From<DataLayerError> for PlanError {
    fn from(err: DataLayerError) -> Self {
        match err {
            DataLayerError::Pushdown { aggregate, reason } => {
                PlanError::DataLayerPushdownFailed { aggregate, reason }
            }
            DataLayerError::Execution { resource, reason } => {
                PlanError::DataLayerExecutionFailed { resource, reason }
            }
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Output of one planning pass.
#[derive(Debug, Default)]
pub struct Plan {
    /// One per relationship-path group, when authorizing.
    pub authorization_units: Vec<WorkUnit>,
    /// One per needs-fetch group.
    pub value_fetch_units: Vec<WorkUnit>,
    /// Descriptors that stay folded into the primary query.
    pub folded: Vec<AggregateDescriptor>,
}

impl Plan {
    /// All emitted units, ready for a scheduler.
    pub fn into_units(self) -> Vec<WorkUnit> {
        let mut units = self.authorization_units;
        units.extend(self.value_fetch_units);
        units
    }

    pub fn is_empty(&self) -> bool {
        self.authorization_units.is_empty()
            && self.value_fetch_units.is_empty()
            && self.folded.is_empty()
    }
}

/// Main entry point for aggregate planning.
pub struct AggregatePlanner {
    schema: Arc<Schema>,
    data_layer: Arc<dyn DataLayer>,
    authorizer: Arc<dyn Authorizer>,
}

impl AggregatePlanner {
    /// Create a planner. Authorization defaults to [`AllowAll`]; override it
    /// with [`with_authorizer`](Self::with_authorizer).
    pub fn new(schema: Arc<Schema>, data_layer: Arc<dyn DataLayer>) -> Self {
        Self {
            schema,
            data_layer,
            authorizer: Arc::new(AllowAll),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Plan all aggregates attached to `query`.
    ///
    /// When `authorizing` is false, no authorization unit is ever produced,
    /// for any classification.
    pub fn plan(&self, query: &Query, authorizing: bool) -> PlanResult<Plan> {
        build::build_units(
            &self.schema,
            &self.authorizer,
            &self.data_layer,
            query,
            authorizing,
        )
    }
}
