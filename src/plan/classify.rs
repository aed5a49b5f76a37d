//! In-query vs needs-fetch classification for a relationship path.
//!
//! A path resolves via an independent fetch only when a structural reverse
//! relationship exists to re-scope the related resource, and the primary
//! query does not already compute an aggregate with this path itself (in
//! its filter or sort). Otherwise the path's descriptors fold into the
//! primary query unchanged.

use crate::query::Query;
use crate::schema::{ReverseRelationship, Schema};

use super::PlanResult;

/// How one relationship-path group resolves.
#[derive(Debug)]
pub struct Classification {
    /// The derived reverse relationship, when the path has one. Kept even
    /// for in-query paths: authorization checks still use it for scoping.
    pub reverse: Option<ReverseRelationship>,
    /// True when the path's descriptors fold into the primary query.
    pub in_query: bool,
}

/// Classify a relationship-path group against the primary query.
pub fn classify(schema: &Schema, query: &Query, path: &[String]) -> PlanResult<Classification> {
    let reverse = schema.reverse_relationship(&query.resource, path)?;
    let in_query = reverse.is_none() || aggregate_matching_path_used_in_query(query, path);
    Ok(Classification { reverse, in_query })
}

/// True if the primary query's filter references an aggregate with this
/// exact path, or its sort names a sort key that maps (through the query's
/// own aggregate set) to an aggregate with this path.
fn aggregate_matching_path_used_in_query(query: &Query, path: &[String]) -> bool {
    let matches_path = |name: &str| {
        query
            .aggregates
            .get(name)
            .is_some_and(|aggregate| aggregate.relationship_path == path)
    };

    if let Some(filter) = &query.filter {
        if filter
            .referenced_aggregates()
            .into_iter()
            .any(|name| matches_path(name))
        {
            return true;
        }
    }

    query.sort.iter().any(|sort| matches_path(&sort.field))
}
