//! Usage endpoints

use crate::error::{ApiError, ApiResult};
use crate::models::ApiResponse;
use crate::state::ApiState;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use settle_limits::{Period, UsageSummary};
use settle_store::GatewayError;
use settle_tenant::current;
use std::sync::Arc;

/// Usage routes
pub fn router() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/", get(usage_summary))
        .route("/history", get(usage_history))
}

#[derive(Debug, Deserialize)]
struct SummaryParams {
    /// Calendar month, `YYYY-MM`; defaults to the current UTC month
    period: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    months: Option<u32>,
}

/// Consumption for one period, with percent-of-cap
async fn usage_summary(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Json<ApiResponse<UsageSummary>>> {
    let ctx = current().map_err(GatewayError::from)?;
    let period = params
        .period
        .map(|raw| raw.parse::<Period>())
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let summary = state
        .meter
        .summary(&ctx.tenant, &state.config.tiers, period)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Past months that recorded usage, newest first
async fn usage_history(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<ApiResponse<Vec<UsageSummary>>>> {
    let ctx = current().map_err(GatewayError::from)?;
    let months = params.months.unwrap_or(6).clamp(1, 24);

    let history = state
        .meter
        .history(&ctx.tenant, &state.config.tiers, months)
        .await?;
    Ok(Json(ApiResponse::success(history)))
}
