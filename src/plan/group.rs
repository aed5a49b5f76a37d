//! Grouping of aggregate descriptors by relationship path.
//!
//! Purely a deduplication step: every descriptor sharing an exact path gets
//! one authorization check and one fetch, never two. Grouping is
//! order-sensitive sequence equality - `["a","b"]` and `["a","c"]` never
//! merge.

use std::collections::{BTreeMap, HashMap};

use crate::aggregate::AggregateDescriptor;

/// Partition a query's aggregates by exact relationship path.
///
/// A `BTreeMap` keyed by path, with descriptors sorted by name within each
/// group, so downstream unit emission is deterministic.
pub fn group_by_path(
    aggregates: &HashMap<String, AggregateDescriptor>,
) -> BTreeMap<Vec<String>, Vec<AggregateDescriptor>> {
    let mut groups: BTreeMap<Vec<String>, Vec<AggregateDescriptor>> = BTreeMap::new();
    for descriptor in aggregates.values() {
        groups
            .entry(descriptor.relationship_path.clone())
            .or_default()
            .push(descriptor.clone());
    }
    for descriptors in groups.values_mut() {
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
    }
    groups
}
