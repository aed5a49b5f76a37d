//! Aggregate descriptors.
//!
//! An [`AggregateDescriptor`] is an immutable value describing one
//! relationship-scoped aggregate: what to compute (the kind), where (the
//! relationship path), and over which related rows (the sub-query).
//! Construction is pure and validates the sub-query up front; nothing here
//! touches the data layer.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::query::{Expr, Query};
use crate::value::{Value, ValueType};

/// Result type for descriptor construction.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Errors from aggregate descriptor construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// The requested kind is not a known aggregate kind.
    #[error("invalid aggregate kind: {0:?}")]
    InvalidAggregateKind(String),

    /// The sub-query uses a feature aggregates do not support.
    #[error("aggregate {name:?} sub-query must not use {feature}")]
    UnsupportedSubQueryFeature {
        name: String,
        feature: SubQueryFeature,
    },

    /// The relationship path had no hops.
    #[error("aggregate {0:?} requires a non-empty relationship path")]
    EmptyRelationshipPath(String),
}

/// The sub-query features aggregates reject, in violation-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubQueryFeature {
    SideLoads,
    NestedAggregates,
    Sort,
    Limit,
    Offset,
}

impl fmt::Display for SubQueryFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubQueryFeature::SideLoads => "side-loads",
            SubQueryFeature::NestedAggregates => "nested aggregates",
            SubQueryFeature::Sort => "a sort",
            SubQueryFeature::Limit => "a limit",
            SubQueryFeature::Offset => "a non-zero offset",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Kinds
// =============================================================================

/// Aggregate kind. Closed: adding a kind means extending both mappings
/// below, and the compiler will insist on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Count,
}

impl AggregateKind {
    /// The result type this kind produces.
    pub fn result_type(&self) -> ValueType {
        match self {
            AggregateKind::Count => ValueType::Int,
        }
    }

    /// The value a parent with no related rows gets.
    pub fn default_value(&self) -> Value {
        match self {
            AggregateKind::Count => Value::Int(0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
        }
    }
}

impl FromStr for AggregateKind {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(AggregateKind::Count),
            other => Err(AggregateError::InvalidAggregateKind(other.into())),
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Relationship path normalization
// =============================================================================

/// A relationship, given either as a single hop or a full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipPath(Vec<String>);

impl From<&str> for RelationshipPath {
    fn from(hop: &str) -> Self {
        RelationshipPath(vec![hop.into()])
    }
}

impl From<Vec<String>> for RelationshipPath {
    fn from(path: Vec<String>) -> Self {
        RelationshipPath(path)
    }
}

impl From<&[&str]> for RelationshipPath {
    fn from(path: &[&str]) -> Self {
        RelationshipPath(path.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RelationshipPath {
    fn from(path: [&str; N]) -> Self {
        path.as_slice().into()
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// An immutable description of one relationship-scoped aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateDescriptor {
    /// Resource the aggregate is declared on.
    pub resource: String,
    /// Unique within a query; doubles as the result-row key.
    pub name: String,
    pub kind: AggregateKind,
    pub result_type: ValueType,
    pub default_value: Value,
    /// Ordered hops from `resource` to the aggregated resource. Never empty.
    pub relationship_path: Vec<String>,
    /// Scopes which related rows count toward the aggregate.
    pub sub_query: Query,
    /// Authorization filter discovered at runtime; conjoined into the
    /// sub-query before execution when present.
    pub resolved_authorization_filter: Option<Expr>,
}

impl AggregateDescriptor {
    /// Build a descriptor, or fail with the first violated rule.
    ///
    /// `kind` is resolved by name so unknown kinds surface as
    /// [`AggregateError::InvalidAggregateKind`]. Sub-query violations are
    /// reported first-in-priority-order: side-loads, nested aggregates,
    /// sort, limit, offset.
    pub fn build(
        resource: &str,
        name: &str,
        kind: &str,
        relationship: impl Into<RelationshipPath>,
        sub_query: Query,
    ) -> AggregateResult<Self> {
        let kind = AggregateKind::from_str(kind)?;
        validate_sub_query(name, &sub_query)?;

        let RelationshipPath(relationship_path) = relationship.into();
        if relationship_path.is_empty() {
            return Err(AggregateError::EmptyRelationshipPath(name.into()));
        }

        Ok(Self {
            resource: resource.into(),
            name: name.into(),
            kind,
            result_type: kind.result_type(),
            default_value: kind.default_value(),
            relationship_path,
            sub_query,
            resolved_authorization_filter: None,
        })
    }

    /// Conjoin a runtime-discovered authorization filter into the sub-query.
    pub fn with_authorization_filter(mut self, filter: Expr) -> Self {
        self.sub_query = self.sub_query.and_filter(filter.clone());
        self.resolved_authorization_filter = Some(filter);
        self
    }
}

/// Free-function form of [`AggregateDescriptor::build`].
pub fn build_aggregate_descriptor(
    resource: &str,
    name: &str,
    kind: &str,
    relationship: impl Into<RelationshipPath>,
    sub_query: Query,
) -> AggregateResult<AggregateDescriptor> {
    AggregateDescriptor::build(resource, name, kind, relationship, sub_query)
}

fn validate_sub_query(name: &str, sub_query: &Query) -> AggregateResult<()> {
    let violation = if !sub_query.side_loads.is_empty() {
        Some(SubQueryFeature::SideLoads)
    } else if !sub_query.aggregates.is_empty() {
        Some(SubQueryFeature::NestedAggregates)
    } else if !sub_query.sort.is_empty() {
        Some(SubQueryFeature::Sort)
    } else if sub_query.limit.is_some() {
        Some(SubQueryFeature::Limit)
    } else if sub_query.offset != 0 {
        Some(SubQueryFeature::Offset)
    } else {
        None
    };

    match violation {
        Some(feature) => Err(AggregateError::UnsupportedSubQueryFeature {
            name: name.into(),
            feature,
        }),
        None => Ok(()),
    }
}
