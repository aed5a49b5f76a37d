//! Ready-queue resolver for work units.
//!
//! Minimal scheduler honoring the work-unit contract: a unit runs only once
//! every declared dependency has a stored value, each result is stored
//! exactly once, and a failed unit poisons the pass - its dependents never
//! run. Independent ready units are evaluated concurrently.

use futures::future::join_all;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::HashMap;

use crate::data::Row;
use crate::plan::{Plan, PlanError, PlanResult, ResultStore, UnitOutput, UnitPath, WorkUnit};
use crate::query::Expr;

/// Seed a result store with the primary query's runtime outputs.
///
/// In production these are produced by the primary query's own work unit;
/// callers driving this resolver directly supply them up front.
pub fn seed(filter: Option<Expr>, rows: Vec<Row>) -> PlanResult<ResultStore> {
    let mut store = ResultStore::new();
    store.insert(UnitPath::QueryFilter, UnitOutput::Filter(filter))?;
    store.insert(UnitPath::QueryRows, UnitOutput::Rows(rows))?;
    Ok(store)
}

/// Resolve a whole plan's units against a seeded store.
pub async fn resolve_plan(plan: Plan, store: ResultStore) -> PlanResult<ResultStore> {
    resolve(plan.into_units(), store).await
}

/// Run every unit to completion, returning the final store.
///
/// Fails fast: the first unit error is returned as the pass's error, and
/// units depending on the failed one are never evaluated.
pub async fn resolve(units: Vec<WorkUnit>, mut store: ResultStore) -> PlanResult<ResultStore> {
    let mut by_path: HashMap<&UnitPath, usize> = HashMap::new();
    for (index, unit) in units.iter().enumerate() {
        if store.contains(&unit.path) {
            return Err(PlanError::DuplicateResult(unit.path.clone()));
        }
        if by_path.insert(&unit.path, index).is_some() {
            return Err(PlanError::DuplicateUnitPath(unit.path.clone()));
        }
    }

    // Dependency graph: edge from producer to consumer. Dependencies that
    // are neither a unit's path nor already seeded can never be satisfied.
    let mut graph = DiGraph::<usize, ()>::new();
    let nodes: Vec<_> = (0..units.len()).map(|i| graph.add_node(i)).collect();
    for (index, unit) in units.iter().enumerate() {
        for dependency in &unit.dependencies {
            match by_path.get(dependency) {
                Some(&producer) => {
                    graph.add_edge(nodes[producer], nodes[index], ());
                }
                None if store.contains(dependency) => {}
                None => return Err(PlanError::MissingDependency(dependency.clone())),
            }
        }
    }
    toposort(&graph, None).map_err(|_| PlanError::DependencyCycle)?;

    let mut done = vec![false; units.len()];
    let mut completed = 0;
    while completed < units.len() {
        let ready: Vec<usize> = units
            .iter()
            .enumerate()
            .filter(|(index, unit)| {
                !done[*index] && unit.dependencies.iter().all(|d| store.contains(d))
            })
            .map(|(index, _)| index)
            .collect();
        // The toposort above guarantees progress while units remain.
        if ready.is_empty() {
            return Err(PlanError::DependencyCycle);
        }

        let outputs = join_all(ready.iter().map(|&i| units[i].computation.run(&store))).await;
        for (&index, output) in ready.iter().zip(outputs) {
            store.insert(units[index].path.clone(), output?)?;
            done[index] = true;
            completed += 1;
        }
    }

    Ok(store)
}
