//! Work-unit emission for one planning pass.
//!
//! Per relationship-path group: at most one authorization unit and at most
//! one value-fetch unit, wired together and onto the primary query's own
//! store paths. Descriptors whose group resolves in-query come back in the
//! folded set instead of getting a fetch unit.

use async_trait::async_trait;
use std::sync::Arc;

use crate::authorize::Authorizer;
use crate::data::DataLayer;
use crate::query::Query;
use crate::schema::Schema;

use super::assemble::assemble_related_query;
use super::classify::classify;
use super::group::group_by_path;
use super::merge::ValueFetchComputation;
use super::unit::{Deferred, ResultStore, UnitComputation, UnitOutput, UnitPath, WorkUnit};
use super::{Plan, PlanError, PlanResult};

/// Computation body of an authorization unit: resolve the (possibly
/// deferred) related query, then strict-check read permission on the
/// related resource. The output is the discovered filter, or `None` for an
/// unconditional grant.
struct AuthorizationComputation {
    authorizer: Arc<dyn Authorizer>,
    related: String,
    related_query: Deferred<Query>,
}

#[async_trait]
impl UnitComputation for AuthorizationComputation {
    async fn run(&self, store: &ResultStore) -> PlanResult<UnitOutput> {
        let query = self.related_query.resolve(store)?;
        let filter = self.authorizer.strict_check(&self.related, &query).await?;
        Ok(UnitOutput::Filter(filter))
    }
}

pub(super) fn build_units(
    schema: &Schema,
    authorizer: &Arc<dyn Authorizer>,
    data_layer: &Arc<dyn DataLayer>,
    query: &Query,
    authorizing: bool,
) -> PlanResult<Plan> {
    let primary_key = schema.primary_key(&query.resource)?.to_vec();

    let mut plan = Plan::default();

    for (path, descriptors) in group_by_path(&query.aggregates) {
        let classification = classify(schema, query, &path)?;
        let related = schema.related(&query.resource, &path)?;
        let authorization_path = UnitPath::Authorization(path.clone());

        // Authorization is evaluated independently of fetch strategy: one
        // path-unique unit per group whenever authorizing, in-query groups
        // included.
        if authorizing {
            let related_query =
                assemble_related_query(&related, classification.reverse.as_ref());
            plan.authorization_units.push(WorkUnit::new(
                authorization_path.clone(),
                related_query.dependencies().to_vec(),
                AuthorizationComputation {
                    authorizer: Arc::clone(authorizer),
                    related: related.clone(),
                    related_query,
                },
            ));
        }

        if classification.in_query {
            plan.folded.extend(descriptors);
            continue;
        }

        // A fetch unit re-scopes by primary-key tuples; without key fields
        // the re-scoping filter would vanish and fetch the whole table.
        if primary_key.is_empty() {
            return Err(PlanError::MissingPrimaryKey {
                resource: query.resource.clone(),
            });
        }

        let mut dependencies = vec![UnitPath::QueryRows];
        let fetch_authorization_path = authorizing.then(|| authorization_path.clone());
        if let Some(auth_path) = &fetch_authorization_path {
            dependencies.push(auth_path.clone());
        }

        plan.value_fetch_units.push(WorkUnit::new(
            UnitPath::AggregateValues(path),
            dependencies,
            ValueFetchComputation {
                data_layer: Arc::clone(data_layer),
                primary_query: query.clone(),
                primary_key: primary_key.clone(),
                aggregates: descriptors,
                authorization_path: fetch_authorization_path,
            },
        ));
    }

    Ok(plan)
}
