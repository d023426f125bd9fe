//! Tenant Context Carrier
//!
//! Propagates the resolved tenant through the whole asynchronous call graph
//! of one request without parameter threading. Built on a tokio task-local:
//! the binding survives every await inside the scoped future and is
//! invisible to every other task, so two concurrent requests can never
//! observe each other's tenant. The scope ends when the wrapped future
//! completes, on success, error, or panic; no explicit teardown exists.

use crate::model::{Tenant, TenantId};
use crate::resolver::ResolutionMethod;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT_TENANT: TenantContext;
}

/// Context error
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// A code path ran outside any established tenant scope
    #[error("no tenant context established for this task")]
    Missing,
}

/// Resolved tenant context, one per in-flight request
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// The resolved tenant
    pub tenant: Arc<Tenant>,
    /// How the tenant was identified
    pub method: ResolutionMethod,
    /// When resolution happened
    pub resolved_at: DateTime<Utc>,
}

impl TenantContext {
    /// Create a context for a freshly resolved tenant
    pub fn new(tenant: Tenant, method: ResolutionMethod) -> Self {
        Self {
            tenant: Arc::new(tenant),
            method,
            resolved_at: Utc::now(),
        }
    }

    /// Identifier of the context tenant
    pub fn tenant_id(&self) -> TenantId {
        self.tenant.id
    }
}

/// Run `fut` with `ctx` ambiently available to its entire continuation
pub async fn with_context<F: Future>(ctx: TenantContext, fut: F) -> F::Output {
    CURRENT_TENANT.scope(ctx, fut).await
}

/// The current context, or [`ContextError::Missing`] outside any scope
pub fn current() -> Result<TenantContext, ContextError> {
    CURRENT_TENANT
        .try_with(|ctx| ctx.clone())
        .map_err(|_| ContextError::Missing)
}

/// The current context if one is established
pub fn try_current() -> Option<TenantContext> {
    CURRENT_TENANT.try_with(|ctx| ctx.clone()).ok()
}

/// Whether a tenant scope is established
pub fn has_context() -> bool {
    CURRENT_TENANT.try_with(|_| ()).is_ok()
}

/// Identifier of the current tenant
pub fn current_tenant_id() -> Result<TenantId, ContextError> {
    CURRENT_TENANT
        .try_with(|ctx| ctx.tenant.id)
        .map_err(|_| ContextError::Missing)
}
