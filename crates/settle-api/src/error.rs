//! Error-to-Response Mapping
//!
//! One place decides what each failure class looks like on the wire.
//! An unresolved tenant on a protected route is deliberately a 404, not a
//! 401/403: the response must not reveal whether a credential or a tenant
//! exists. Dependency degradation never reaches here; the engine absorbs
//! it and serves from the durable stores.

use crate::models::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use settle_limits::CounterStoreError;
use settle_store::{GatewayError, StoreError};
use settle_tenant::{ContextError, DirectoryError};

/// API error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No resolution strategy matched on a protected route
    #[error("tenant not found")]
    TenantNotResolved,
    /// Caller lacks the platform-admin role
    #[error("forbidden")]
    Forbidden,
    /// Tenant window exhausted
    #[error("too many requests")]
    RateLimited,
    /// Data gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Tenant directory failure
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    /// Usage counter store failure
    #[error(transparent)]
    Counters(#[from] CounterStoreError),
    /// Malformed request payload
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::TenantNotResolved => (StatusCode::NOT_FOUND, "tenant_not_found"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Gateway(err) => match err {
                GatewayError::CrossTenant { .. } => (StatusCode::FORBIDDEN, "forbidden"),
                GatewayError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                GatewayError::Context(ContextError::Missing) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                }
                GatewayError::Store(StoreError::Unavailable(_)) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            Self::Directory(err) => match err {
                DirectoryError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                DirectoryError::Duplicate { .. } => (StatusCode::CONFLICT, "conflict"),
                DirectoryError::Unavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
                }
            },
            Self::Counters(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        // 5xx details stay in the logs, not on the wire
        let message = if status.is_server_error() {
            "internal error".to_string()
        } else {
            self.to_string()
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(ApiResponse::<serde_json::Value>::error(code, &message)),
        )
            .into_response()
    }
}

/// Shorthand result for handlers
pub type ApiResult<T> = Result<T, ApiError>;
