//! Work units, the result store, and deferred computations.
//!
//! A work unit is a schedulable computation with declared data dependencies
//! and a single stored result. Units never see each other directly: a unit's
//! computation reads the values of its dependencies from an injected,
//! read-only [`ResultStore`] snapshot and returns one output, which the
//! scheduler stores under the unit's path. The store is write-once per path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::data::Row;
use crate::query::Expr;
use crate::value::{KeyTuple, Value};

use super::{PlanError, PlanResult};

/// Merged aggregate output: primary-key tuple → aggregate name → value.
pub type AggregateValues = HashMap<KeyTuple, HashMap<String, Value>>;

// =============================================================================
// Store paths and outputs
// =============================================================================

/// Addressable key in the result store, namespaced by the kind of value
/// stored there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitPath {
    /// The primary query's actual filter, known only after planning.
    QueryFilter,
    /// The primary query's fetched rows.
    QueryRows,
    /// The authorization filter for one relationship path.
    Authorization(Vec<String>),
    /// The merged aggregate values for one relationship path.
    AggregateValues(Vec<String>),
}

impl fmt::Display for UnitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitPath::QueryFilter => write!(f, "query.filter"),
            UnitPath::QueryRows => write!(f, "query.rows"),
            UnitPath::Authorization(path) => write!(f, "authorization[{}]", path.join(".")),
            UnitPath::AggregateValues(path) => write!(f, "aggregate_values[{}]", path.join(".")),
        }
    }
}

/// A value stored at a unit path.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutput {
    Filter(Option<Expr>),
    Rows(Vec<Row>),
    AggregateValues(AggregateValues),
}

impl UnitOutput {
    fn kind(&self) -> &'static str {
        match self {
            UnitOutput::Filter(_) => "filter",
            UnitOutput::Rows(_) => "rows",
            UnitOutput::AggregateValues(_) => "aggregate values",
        }
    }
}

// =============================================================================
// Result store
// =============================================================================

/// Path-addressed store of unit outputs.
///
/// Owned by the scheduler; computations receive it as a read-only snapshot.
/// Writes happen exactly once per path.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    values: HashMap<UnitPath, UnitOutput>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a unit's output. Rejects a second write to the same path.
    pub fn insert(&mut self, path: UnitPath, output: UnitOutput) -> PlanResult<()> {
        if self.values.contains_key(&path) {
            return Err(PlanError::DuplicateResult(path));
        }
        self.values.insert(path, output);
        Ok(())
    }

    pub fn contains(&self, path: &UnitPath) -> bool {
        self.values.contains_key(path)
    }

    pub fn get(&self, path: &UnitPath) -> Option<&UnitOutput> {
        self.values.get(path)
    }

    /// Typed read of a stored filter.
    pub fn filter(&self, path: &UnitPath) -> PlanResult<Option<&Expr>> {
        match self.require(path)? {
            UnitOutput::Filter(filter) => Ok(filter.as_ref()),
            other => Err(self.wrong_kind(path, "filter", other)),
        }
    }

    /// Typed read of stored rows.
    pub fn rows(&self, path: &UnitPath) -> PlanResult<&[Row]> {
        match self.require(path)? {
            UnitOutput::Rows(rows) => Ok(rows),
            other => Err(self.wrong_kind(path, "rows", other)),
        }
    }

    /// Typed read of stored aggregate values.
    pub fn aggregate_values(&self, path: &UnitPath) -> PlanResult<&AggregateValues> {
        match self.require(path)? {
            UnitOutput::AggregateValues(values) => Ok(values),
            other => Err(self.wrong_kind(path, "aggregate values", other)),
        }
    }

    fn require(&self, path: &UnitPath) -> PlanResult<&UnitOutput> {
        self.values
            .get(path)
            .ok_or_else(|| PlanError::MissingDependency(path.clone()))
    }

    fn wrong_kind(&self, path: &UnitPath, expected: &'static str, found: &UnitOutput) -> PlanError {
        PlanError::WrongOutputKind {
            path: path.clone(),
            expected,
            found: found.kind(),
        }
    }
}

// =============================================================================
// Work units
// =============================================================================

/// The computation a work unit runs once its dependencies are stored.
///
/// Implementations must be pure over the snapshot: same snapshot, same
/// output, no mutation of anything shared.
#[async_trait]
pub trait UnitComputation: Send + Sync {
    async fn run(&self, store: &ResultStore) -> PlanResult<UnitOutput>;
}

/// A schedulable computation with declared data dependencies and a single
/// stored result. Created once per planning pass, never re-entered.
pub struct WorkUnit {
    pub path: UnitPath,
    pub dependencies: Vec<UnitPath>,
    pub computation: Box<dyn UnitComputation>,
}

impl WorkUnit {
    pub fn new(
        path: UnitPath,
        dependencies: Vec<UnitPath>,
        computation: impl UnitComputation + 'static,
    ) -> Self {
        Self {
            path,
            dependencies,
            computation: Box::new(computation),
        }
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("path", &self.path)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Deferred values
// =============================================================================

/// A value that can only be produced once other units' outputs exist.
///
/// Used where an input is discovered at runtime - most notably the related
/// query assembled from the primary query's actual filter. Participates in
/// the dependency graph through `dependencies`, and is resolved against the
/// snapshot the owning unit runs with.
pub struct Deferred<T> {
    dependencies: Vec<UnitPath>,
    resolve: Box<dyn Fn(&ResultStore) -> PlanResult<T> + Send + Sync>,
}

impl<T> Deferred<T> {
    pub fn new(
        dependencies: Vec<UnitPath>,
        resolve: impl Fn(&ResultStore) -> PlanResult<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            dependencies,
            resolve: Box::new(resolve),
        }
    }

    /// A deferred value that is already known.
    pub fn ready(value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self::new(vec![], move |_| Ok(value.clone()))
    }

    pub fn dependencies(&self) -> &[UnitPath] {
        &self.dependencies
    }

    pub fn resolve(&self, store: &ResultStore) -> PlanResult<T> {
        (self.resolve)(store)
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}
