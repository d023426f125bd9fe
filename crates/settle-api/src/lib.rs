//! OpenSettle Platform API
//!
//! REST surface over the tenant attribution engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        REQUEST PIPELINE                             │
//! │                                                                     │
//! │  claims ──▶ tenant resolution ──▶ guard ──▶ rate limit ──▶ handler  │
//! │               │                                  │                  │
//! │               │ task-local tenant scope          │ usage meter      │
//! │               ▼                                  ▼ (fire & forget)  │
//! │        every handler and repository      X-RateLimit-* headers      │
//! │        below runs inside the scope       on every response          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub use error::{ApiError, ApiResult};
pub use models::{ApiResponse, ErrorResponse};
pub use state::ApiState;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "OpenSettle API",
        version = "1.0.0",
        description = "OpenSettle platform API - multi-tenant payments core",
        license(name = "Apache-2.0")
    ),
    paths(routes::health::health_check),
    components(schemas(models::ErrorResponse, models::HealthStatus)),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "payments", description = "Tenant-scoped payment records"),
        (name = "usage", description = "Usage metering"),
        (name = "admin", description = "Platform administration")
    )
)]
pub struct ApiDoc;

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    let protected = Router::new()
        .nest("/payments", routes::payments::router())
        .nest("/usage", routes::usage::router())
        .route_layer(axum::middleware::from_fn(middleware::require_tenant));

    let admin = Router::new().nest("/admin/tenants", routes::admin::router());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_spec))
        .nest("/api/v1", protected.merge(admin))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::resolve_tenant,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::extract_claims,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
