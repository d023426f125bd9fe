//! Per-Tenant Rate Limiter
//!
//! Sliding-window admission per (tenant, endpoint) pair, limits taken from
//! the tenant's effective tier. When the backing store is unreachable the
//! limiter fails open: availability beats strictness, and the loud warning
//! is the trace that limits went unenforced during the outage.

use crate::window::{WindowOutcome, WindowStore};
use serde::{Deserialize, Serialize};
use settle_common::{PlatformConfig, TierTable};
use settle_tenant::Tenant;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests permitted per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the window frees up, seconds since epoch
    pub reset_at: i64,
    /// Seconds to wait before retrying; only set on rejection
    pub retry_after_secs: Option<u64>,
}

/// Sliding-window rate limiter
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    window_ms: u64,
    tiers: TierTable,
}

impl RateLimiter {
    /// Build a limiter over a window store
    pub fn new(store: Arc<dyn WindowStore>, config: &PlatformConfig) -> Self {
        Self {
            store,
            window_ms: config.rate_window_ms,
            tiers: config.tiers.clone(),
        }
    }

    /// Atomically check the tenant's window and consume a slot if allowed
    pub async fn check_and_consume(&self, tenant: &Tenant, endpoint: &str) -> RateLimitDecision {
        let limit = tenant.effective_limits(&self.tiers).requests_per_minute;
        let key = window_key(tenant, endpoint);
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;

        match self
            .store
            .admit(&key, now_ms, self.window_ms, u64::from(limit))
            .await
        {
            Ok(outcome) => self.decision(limit, now_ms, outcome),
            Err(err) => {
                warn!(
                    tenant_id = %tenant.id,
                    endpoint,
                    %err,
                    "window store unreachable, failing open: rate limits are NOT enforced"
                );
                RateLimitDecision {
                    allowed: true,
                    limit,
                    remaining: limit,
                    reset_at: ((now_ms + self.window_ms) / 1_000) as i64,
                    retry_after_secs: None,
                }
            }
        }
    }

    fn decision(&self, limit: u32, now_ms: u64, outcome: WindowOutcome) -> RateLimitDecision {
        let reset_ms = outcome
            .oldest_ms
            .map_or(now_ms + self.window_ms, |oldest| oldest + self.window_ms);
        let remaining = u64::from(limit).saturating_sub(outcome.count) as u32;

        if outcome.admitted {
            debug!(remaining, "request admitted");
            RateLimitDecision {
                allowed: true,
                limit,
                remaining,
                reset_at: (reset_ms / 1_000) as i64,
                retry_after_secs: None,
            }
        } else {
            let retry_after = reset_ms.saturating_sub(now_ms).div_ceil(1_000).max(1);
            RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: (reset_ms / 1_000) as i64,
                retry_after_secs: Some(retry_after),
            }
        }
    }
}

fn window_key(tenant: &Tenant, endpoint: &str) -> String {
    format!("ratelimit:{}:{}", tenant.id, endpoint)
}
