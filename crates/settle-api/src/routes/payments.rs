//! Payment endpoints
//!
//! Thin handlers over [`PaymentRepository`]; all tenant scoping happens in
//! the gateway underneath. Handlers never read a tenant identifier from
//! the request.

use crate::error::{ApiError, ApiResult};
use crate::middleware::ClaimSet;
use crate::models::ApiResponse;
use crate::state::ApiState;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use settle_limits::UsageMetric;
use settle_store::{GatewayError, NewPayment, Payment, PaymentStatus, StatusTotal};
use settle_tenant::current_tenant_id;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Payment routes, all behind the tenant guard
pub fn router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/", get(list_payments).post(create_payment))
        .route("/summary", get(payment_summary))
        .route(
            "/:id",
            get(get_payment).patch(update_status).delete(delete_payment),
        )
        .route("/:id/restore", post(restore_payment))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    status: Option<PaymentStatus>,
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: PaymentStatus,
}

/// List the tenant's payments
async fn list_payments(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ApiResponse<Vec<Payment>>>> {
    let payments = if params.include_deleted {
        state.payments.list_with_deleted().await?
    } else {
        state.payments.list(params.status).await?
    };
    Ok(Json(ApiResponse::success(payments)))
}

/// Record a payment; the transaction counter tracks it fire-and-forget
async fn create_payment(
    State(state): State<Arc<ApiState>>,
    Json(new): Json<NewPayment>,
) -> ApiResult<Json<ApiResponse<Payment>>> {
    let payment = state.payments.create(new).await?;

    let meter = state.meter.clone();
    let tenant_id = current_tenant_id().map_err(GatewayError::from)?;
    tokio::spawn(async move {
        if let Err(err) = meter
            .increment(&tenant_id, UsageMetric::Transactions, 1)
            .await
        {
            warn!(%tenant_id, %err, "transaction tracking failed");
        }
    });

    Ok(Json(ApiResponse::success(payment)))
}

/// Fetch one payment
async fn get_payment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Payment>>> {
    let payment = state
        .payments
        .get(id)
        .await?
        .ok_or(ApiError::Gateway(GatewayError::NotFound))?;
    Ok(Json(ApiResponse::success(payment)))
}

/// Move a payment to a new lifecycle state
async fn update_status(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<ApiResponse<Payment>>> {
    let payment = state.payments.mark_status(id, update.status).await?;
    Ok(Json(ApiResponse::success(payment)))
}

/// Soft delete; the record stays recoverable via restore
async fn delete_payment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    claims: Option<Extension<ClaimSet>>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let actor = claims
        .as_ref()
        .and_then(|Extension(claims)| claims.get_str("sub"))
        .map(String::from);
    state.payments.soft_delete(id, actor.as_deref()).await?;
    Ok(Json(ApiResponse::success(())))
}

/// Undo a soft delete
async fn restore_payment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Payment>>> {
    let payment = state.payments.restore(id).await?;
    Ok(Json(ApiResponse::success(payment)))
}

/// Per-status rollup of live payments
async fn payment_summary(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<ApiResponse<Vec<StatusTotal>>>> {
    let totals = state.payments.status_totals().await?;
    Ok(Json(ApiResponse::success(totals)))
}
