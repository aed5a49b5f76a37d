//! # Tally
//!
//! Relationship-scoped aggregate planning for resource queries.
//!
//! ## Architecture
//!
//! A query carries aggregate descriptors (counts over related collections);
//! tally turns them into a dependency graph of work units whose inputs are
//! only known at runtime:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Query + AggregateDescriptors (by name)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [group by relationship path]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Path groups, one auth/fetch pair at most           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [classify: reverse relationship?]
//! ┌─────────────────────────────────────────────────────────┐
//! │   in-query (folded)       │       needs-fetch             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [emit work units]
//! ┌─────────────────────────────────────────────────────────┐
//! │  authorization unit ──▶ value-fetch unit ──▶ merged map  │
//! │       (filter)           (rows by primary-key tuple)     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Units declare their inputs as result-store paths (the primary query's
//! actual filter, its fetched rows, a sibling unit's output) and are
//! resolved by a scheduler - [`engine`] ships a minimal one.

pub mod aggregate;
pub mod authorize;
pub mod data;
pub mod engine;
pub mod plan;
pub mod query;
pub mod schema;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::aggregate::{
        build_aggregate_descriptor, AggregateDescriptor, AggregateError, AggregateKind,
        SubQueryFeature,
    };
    pub use crate::authorize::{AllowAll, AuthorizationError, Authorizer};
    pub use crate::data::{DataLayer, DataLayerError, Row};
    pub use crate::plan::{
        AggregatePlanner, AggregateValues, Plan, PlanError, PlanResult, ResultStore, UnitOutput,
        UnitPath, WorkUnit,
    };
    pub use crate::query::{
        // Constructors
        aggregate_ref,
        and_all,
        field,
        field_at,
        lit_bool,
        lit_int,
        lit_null,
        lit_str,
        or_all,
        // Types
        BinaryOperator,
        Expr,
        ExprExt,
        Query,
        SortDirection,
        SortField,
    };
    pub use crate::schema::{
        Relationship, RelationshipKind, Resource, ReverseRelationship, Schema,
    };
    pub use crate::value::{KeyTuple, Value, ValueType};
}

// Also export at crate root for convenience
pub use aggregate::{build_aggregate_descriptor, AggregateDescriptor, AggregateKind};
pub use plan::{AggregatePlanner, Plan, PlanError, PlanResult};
pub use query::{field, lit_int, Expr, ExprExt, Query};
pub use schema::{Relationship, Resource, Schema};
pub use value::{KeyTuple, Value};
