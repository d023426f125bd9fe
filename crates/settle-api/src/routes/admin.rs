//! Administrative tenant endpoints
//!
//! Platform-level surface, gated by [`require_admin`] at registration
//! time. These operate across tenants by design and go through the
//! registry, which owns the cache invalidation that keeps routing fresh.

use crate::error::ApiResult;
use crate::middleware::require_admin;
use crate::models::ApiResponse;
use crate::state::ApiState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use settle_tenant::{NewTenant, Tenant, TenantUpdate};
use std::sync::Arc;
use uuid::Uuid;

/// Administrative tenant routes, gated by the platform-admin role
pub fn router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/", post(create_tenant).get(list_tenants))
        .route(
            "/:id",
            get(get_tenant).patch(update_tenant).delete(deactivate_tenant),
        )
        .route("/:id/api-key", post(rotate_api_key))
        .route_layer(axum::middleware::from_fn(require_admin))
}

/// Provision a tenant
async fn create_tenant(
    State(state): State<Arc<ApiState>>,
    Json(new): Json<NewTenant>,
) -> ApiResult<Json<ApiResponse<Tenant>>> {
    let tenant = state.registry.create(new).await?;
    Ok(Json(ApiResponse::success(tenant)))
}

/// All tenants, active and not
async fn list_tenants(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<ApiResponse<Vec<Tenant>>>> {
    let tenants = state.registry.list().await?;
    Ok(Json(ApiResponse::success(tenants)))
}

/// Fetch one tenant
async fn get_tenant(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Tenant>>> {
    let tenant = state.registry.get(&id).await?;
    Ok(Json(ApiResponse::success(tenant)))
}

/// Apply an administrative update
async fn update_tenant(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<TenantUpdate>,
) -> ApiResult<Json<ApiResponse<Tenant>>> {
    let tenant = state.registry.update(&id, update).await?;
    Ok(Json(ApiResponse::success(tenant)))
}

/// Deactivate; the record is kept, resolution stops
async fn deactivate_tenant(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Tenant>>> {
    let tenant = state.registry.deactivate(&id).await?;
    Ok(Json(ApiResponse::success(tenant)))
}

/// Issue a fresh API credential, revoking the old one
async fn rotate_api_key(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Tenant>>> {
    let tenant = state.registry.regenerate_api_key(&id).await?;
    Ok(Json(ApiResponse::success(tenant)))
}
