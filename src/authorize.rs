//! Permission evaluator contract.
//!
//! Authorization for aggregate fetches is strict-check-only: the evaluator
//! is asked, once per relationship path, whether reading the related
//! resource is permitted, and may answer with an additional filter that
//! scopes what the caller is allowed to see. Only that filter output is
//! consumed here; the evaluation itself lives with the embedder.

use async_trait::async_trait;
use thiserror::Error;

use crate::query::{Expr, Query};

/// Result type for authorization checks.
pub type AuthorizeResult<T> = Result<T, AuthorizationError>;

/// A denied or failed permission check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not authorized to read {resource:?}: {reason}")]
pub struct AuthorizationError {
    pub resource: String,
    pub reason: String,
}

impl AuthorizationError {
    pub fn new(resource: &str, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

/// Strict-check-only permission evaluation, scoped to the read action.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Check read permission on `resource` for `query`.
    ///
    /// `Ok(None)` grants unconditionally; `Ok(Some(filter))` grants subject
    /// to the filter, which the caller must conjoin into every sub-query it
    /// executes against the resource.
    async fn strict_check(&self, resource: &str, query: &Query) -> AuthorizeResult<Option<Expr>>;
}

/// Grants everything unconditionally. The default when no evaluator is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn strict_check(&self, _resource: &str, _query: &Query) -> AuthorizeResult<Option<Expr>> {
        Ok(None)
    }
}
