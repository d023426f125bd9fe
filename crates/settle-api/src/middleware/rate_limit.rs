//! Rate Limiting Middleware
//!
//! Consults the tenant's sliding window before the handler runs and stamps
//! the standard `X-RateLimit-*` headers on every response either way. Each
//! admitted request is tracked by the usage meter fire-and-forget; a
//! disconnecting caller keeps its consumed slot, there is no compensation.

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use settle_limits::{RateLimitDecision, UsageMetric};
use settle_tenant::try_current;
use std::sync::Arc;
use tracing::warn;

static LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
static RETRY_AFTER: HeaderName = HeaderName::from_static("retry-after");

/// Admit or reject the request against the tenant's window
pub async fn rate_limit(State(state): State<Arc<ApiState>>, req: Request, next: Next) -> Response {
    // no tenant, nothing to limit; the guard decides whether the request
    // may proceed at all
    let Some(ctx) = try_current() else {
        return next.run(req).await;
    };

    let endpoint = endpoint_scope(req.uri().path());
    let decision = state.limiter.check_and_consume(&ctx.tenant, endpoint).await;

    if !decision.allowed {
        let mut response = ApiError::RateLimited.into_response();
        apply_headers(&mut response, &decision);
        return response;
    }

    let meter = state.meter.clone();
    let tenant_id = ctx.tenant.id;
    tokio::spawn(async move {
        if let Err(err) = meter.increment(&tenant_id, UsageMetric::ApiCalls, 1).await {
            warn!(%tenant_id, %err, "usage tracking failed");
        }
    });

    let mut response = next.run(req).await;
    apply_headers(&mut response, &decision);
    response
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    headers.insert(LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(REMAINING.clone(), HeaderValue::from(decision.remaining));
    headers.insert(RESET.clone(), HeaderValue::from(decision.reset_at));
    if let Some(retry_after) = decision.retry_after_secs {
        headers.insert(RETRY_AFTER.clone(), HeaderValue::from(retry_after));
    }
}

/// First path segment under the API prefix, the window's endpoint scope
fn endpoint_scope(path: &str) -> &str {
    path.strip_prefix("/api/v1/")
        .and_then(|rest| rest.split('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("root")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_scope() {
        assert_eq!(endpoint_scope("/api/v1/payments"), "payments");
        assert_eq!(endpoint_scope("/api/v1/payments/123/restore"), "payments");
        assert_eq!(endpoint_scope("/api/v1/usage"), "usage");
        assert_eq!(endpoint_scope("/health"), "root");
        assert_eq!(endpoint_scope("/api/v1/"), "root");
    }
}
