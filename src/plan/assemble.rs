//! Assembly of the related-resource query used for authorization scoping.
//!
//! The primary query's filter is only known after planning - it may have
//! been rewritten by then - so the related query cannot be built eagerly.
//! What the work-unit builder gets instead is a [`Deferred`] query with a
//! single dependency on the primary query's filter: once that value exists,
//! the filter is rewritten into the related resource's coordinate space
//! through the reverse relationship.

use crate::query::Query;
use crate::schema::ReverseRelationship;

use super::unit::{Deferred, UnitPath};

/// Build the deferred related-resource query for one path group.
///
/// Without a reverse relationship there is nothing to re-scope by, and the
/// related query is just the bare resource, available immediately.
pub fn assemble_related_query(
    related: &str,
    reverse: Option<&ReverseRelationship>,
) -> Deferred<Query> {
    let related = related.to_string();

    let Some(reverse) = reverse else {
        return Deferred::ready(Query::new(&related));
    };

    let reverse_path = reverse.path.clone();
    Deferred::new(vec![UnitPath::QueryFilter], move |store| {
        let query = Query::new(&related);
        Ok(match store.filter(&UnitPath::QueryFilter)? {
            Some(filter) => query.with_filter(filter.clone().at_path(&reverse_path)),
            None => query,
        })
    })
}
