//! Tenant Resolution and Guards
//!
//! `resolve_tenant` attributes the request and wraps the rest of its
//! handling in the tenant scope; `require_tenant` is the entry guard for
//! protected routes; `require_admin` gates the administrative surface.

use crate::error::ApiError;
use crate::middleware::claims::ClaimSet;
use crate::state::ApiState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use settle_tenant::{has_context, with_context, RequestSignals, TenantContext};
use std::sync::Arc;
use tracing::{debug, error};

/// Resolve the tenant and scope the remaining request handling to it
///
/// Resolution failure is not an error here; unprotected routes proceed
/// without a context and `require_tenant` rejects where one is required.
pub async fn resolve_tenant(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    let signals = RequestSignals {
        claims: req.extensions().get::<ClaimSet>().map(|c| c.0.clone()),
        tenant_header: header_string(&req, "x-tenant-id"),
        host: req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };

    match state.resolver.resolve(&signals).await {
        Ok(Some(resolved)) => {
            debug!(
                tenant_id = %resolved.tenant.id,
                method = resolved.method.as_str(),
                "tenant resolved"
            );
            let ctx = TenantContext::new(resolved.tenant, resolved.method);
            with_context(ctx, next.run(req)).await
        }
        Ok(None) => next.run(req).await,
        Err(err) => {
            error!(%err, "tenant resolution failed");
            ApiError::Directory(err).into_response()
        }
    }
}

/// Entry guard: protected routes need an attributed tenant
///
/// The rejection is a 404-class response on purpose; "bad credential" and
/// "no such tenant" must be indistinguishable to the caller.
pub async fn require_tenant(req: Request, next: Next) -> Response {
    if !has_context() {
        return ApiError::TenantNotResolved.into_response();
    }
    next.run(req).await
}

/// Guard for the administrative surface
pub async fn require_admin(req: Request, next: Next) -> Response {
    let authorized = req
        .extensions()
        .get::<ClaimSet>()
        .is_some_and(ClaimSet::is_platform_admin);
    if !authorized {
        return ApiError::Forbidden.into_response();
    }
    next.run(req).await
}

fn header_string(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
