//! Query specification - construct query values with a fluent API.
//!
//! A [`Query`] is an immutable description of a read: which resource, which
//! filter, sort, declared aggregates, side-loads, limit, and offset. The
//! planner consumes queries read-only, except for producing the stripped
//! derivative used by fetch re-scoping.

pub mod expr;

pub use expr::{
    aggregate_ref, and_all, field, field_at, lit_bool, lit_int, lit_null, lit_str, or_all,
    BinaryOperator, Expr, ExprExt,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::aggregate::AggregateDescriptor;

// =============================================================================
// Sort
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A single sort entry. The field may name a plain field or a declared
/// aggregate on the same query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

// =============================================================================
// Query
// =============================================================================

/// An immutable query specification over one resource.
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use = "builders have no effect until used"]
pub struct Query {
    pub resource: String,
    pub filter: Option<Expr>,
    pub sort: Vec<SortField>,
    /// Declared aggregates, by name. Names double as result-row keys and as
    /// back-reference keys in filter and sort expressions.
    pub aggregates: HashMap<String, AggregateDescriptor>,
    /// Relationships to side-load alongside the primary rows.
    pub side_loads: Vec<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    /// Replace the filter.
    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Conjoin an expression into the existing filter.
    pub fn and_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateDescriptor) -> Self {
        self.aggregates.insert(aggregate.name.clone(), aggregate);
        self
    }

    pub fn with_side_load(mut self, relationship: &str) -> Self {
        self.side_loads.push(relationship.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// The stripped derivative used for fetch re-scoping: the same resource
    /// with filter, sort, aggregate, side-load, and pagination state removed.
    ///
    /// Pagination must not survive: the fetch is re-scoped to exactly the
    /// rows the primary query already returned, and a carried offset would
    /// skip them all over again.
    pub fn without_query_state(mut self) -> Self {
        self.filter = None;
        self.sort.clear();
        self.aggregates.clear();
        self.side_loads.clear();
        self.limit = None;
        self.offset = 0;
        self
    }
}
