//! Monthly Usage Metering
//!
//! Accumulates per-tenant consumption counters per calendar month for
//! billing and plan-limit checks. Periods are stamped in UTC so a tenant's
//! month never rolls over at a different wall-clock moment per zone.
//! Counters are atomic hash increments with a retention refresh and are
//! never decremented.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use settle_common::TierTable;
use settle_tenant::{Tenant, TenantId};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Counter store error
#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    /// Store unreachable
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Named counter hash contract
///
/// Increments are atomic and refresh the group's retention deadline.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `amount` to `field` under `key`, returning the new value
    async fn increment(
        &self,
        key: &str,
        field: &str,
        amount: u64,
        retention: Duration,
    ) -> Result<u64, CounterStoreError>;

    /// All counters under `key`, if the group exists
    async fn read(&self, key: &str) -> Result<Option<HashMap<String, u64>>, CounterStoreError>;
}

/// In-memory counter store with lazy retention expiry
pub struct InMemoryCounterStore {
    groups: DashMap<String, (HashMap<String, u64>, Instant)>,
}

impl InMemoryCounterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        field: &str,
        amount: u64,
        retention: Duration,
    ) -> Result<u64, CounterStoreError> {
        let mut group = self
            .groups
            .entry(key.to_string())
            .or_insert_with(|| (HashMap::new(), Instant::now() + retention));
        let (counters, deadline) = group.value_mut();
        *deadline = Instant::now() + retention;
        let value = counters.entry(field.to_string()).or_insert(0);
        *value += amount;
        Ok(*value)
    }

    async fn read(&self, key: &str) -> Result<Option<HashMap<String, u64>>, CounterStoreError> {
        if let Some(group) = self.groups.get(key) {
            let (counters, deadline) = group.value();
            if Instant::now() < *deadline {
                return Ok(Some(counters.clone()));
            }
        }
        self.groups
            .remove_if(key, |_, (_, deadline)| Instant::now() >= *deadline);
        Ok(None)
    }
}

/// Billable usage metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    /// API requests handled
    ApiCalls,
    /// Payment transactions recorded
    Transactions,
    /// Stored bytes
    StorageBytes,
    /// Transferred bytes
    BandwidthBytes,
}

impl UsageMetric {
    /// Counter field name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiCalls => "api_calls",
            Self::Transactions => "transactions",
            Self::StorageBytes => "storage_bytes",
            Self::BandwidthBytes => "bandwidth_bytes",
        }
    }
}

/// A calendar month in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// The current UTC month
    pub fn current() -> Self {
        let now = Utc::now();
        Self {
            year: now.year(),
            month: now.month(),
        }
    }

    /// Build a specific period
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The preceding month
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid period: {s}"))?;
        let year: i32 = year.parse().map_err(|_| format!("invalid period: {s}"))?;
        let month: u32 = month.parse().map_err(|_| format!("invalid period: {s}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("invalid period: {s}"));
        }
        Ok(Self { year, month })
    }
}

/// Usage totals for one tenant and period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Calendar month, `YYYY-MM`
    pub period: String,
    /// API requests handled
    pub api_calls: u64,
    /// Payment transactions recorded
    pub transactions: u64,
    /// Stored bytes
    pub storage_bytes: u64,
    /// Transferred bytes
    pub bandwidth_bytes: u64,
    /// Transactions as a share of the monthly cap, percent;
    /// zero when the cap is unbounded
    pub transaction_percent_used: f64,
}

/// Monthly usage meter
pub struct UsageMeter {
    store: std::sync::Arc<dyn CounterStore>,
    retention: Duration,
}

impl UsageMeter {
    /// Build a meter over a counter store
    pub fn new(store: std::sync::Arc<dyn CounterStore>, retention_days: u32) -> Self {
        Self {
            store,
            retention: Duration::from_secs(u64::from(retention_days) * 24 * 3600),
        }
    }

    /// Add `amount` to the tenant's counter for the current period
    pub async fn increment(
        &self,
        tenant_id: &TenantId,
        metric: UsageMetric,
        amount: u64,
    ) -> Result<u64, CounterStoreError> {
        self.increment_in(tenant_id, metric, amount, Period::current())
            .await
    }

    /// Add `amount` in an explicit period; backfill and tests
    pub async fn increment_in(
        &self,
        tenant_id: &TenantId,
        metric: UsageMetric,
        amount: u64,
        period: Period,
    ) -> Result<u64, CounterStoreError> {
        self.store
            .increment(
                &usage_key(tenant_id, period),
                metric.as_str(),
                amount,
                self.retention,
            )
            .await
    }

    /// Usage for one period (defaults to the current month) with the
    /// transaction cap applied from the tenant's effective limits
    pub async fn summary(
        &self,
        tenant: &Tenant,
        tiers: &TierTable,
        period: Option<Period>,
    ) -> Result<UsageSummary, CounterStoreError> {
        let period = period.unwrap_or_else(Period::current);
        let counters = self
            .store
            .read(&usage_key(&tenant.id, period))
            .await?
            .unwrap_or_default();
        Ok(build_summary(tenant, tiers, period, &counters))
    }

    /// Walk back over past periods, newest first, returning only months
    /// that recorded any usage
    pub async fn history(
        &self,
        tenant: &Tenant,
        tiers: &TierTable,
        months: u32,
    ) -> Result<Vec<UsageSummary>, CounterStoreError> {
        let mut period = Period::current();
        let mut summaries = Vec::new();
        for _ in 0..months {
            if let Some(counters) = self.store.read(&usage_key(&tenant.id, period)).await? {
                summaries.push(build_summary(tenant, tiers, period, &counters));
            }
            period = period.previous();
        }
        Ok(summaries)
    }
}

fn usage_key(tenant_id: &TenantId, period: Period) -> String {
    format!("usage:{tenant_id}:{period}")
}

fn build_summary(
    tenant: &Tenant,
    tiers: &TierTable,
    period: Period,
    counters: &HashMap<String, u64>,
) -> UsageSummary {
    let get = |metric: UsageMetric| counters.get(metric.as_str()).copied().unwrap_or(0);
    let transactions = get(UsageMetric::Transactions);
    let transaction_percent_used = match tenant.effective_limits(tiers).monthly_transactions {
        Some(cap) if cap > 0 => (transactions as f64 / cap as f64) * 100.0,
        _ => 0.0,
    };
    UsageSummary {
        period: period.to_string(),
        api_calls: get(UsageMetric::ApiCalls),
        transactions,
        storage_bytes: get(UsageMetric::StorageBytes),
        bandwidth_bytes: get(UsageMetric::BandwidthBytes),
        transaction_percent_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_common::TenantTier;
    use std::sync::Arc;

    fn meter() -> UsageMeter {
        UsageMeter::new(Arc::new(InMemoryCounterStore::new()), 90)
    }

    #[test]
    fn test_period_key_format() {
        let period = Period::new(2024, 1);
        assert_eq!(period.to_string(), "2024-01");
        assert_eq!(period.previous().to_string(), "2023-12");
        assert_eq!(Period::new(2024, 12).previous().to_string(), "2024-11");
    }

    #[tokio::test]
    async fn test_professional_summary_percent() {
        let meter = meter();
        let tenant = Tenant::new("Bank", "bank1", TenantTier::Professional);
        let tiers = TierTable::default();
        let period = Period::new(2024, 1);

        for _ in 0..892 {
            meter
                .increment_in(&tenant.id, UsageMetric::Transactions, 1, period)
                .await
                .unwrap();
        }

        let summary = meter.summary(&tenant, &tiers, Some(period)).await.unwrap();
        assert_eq!(summary.transactions, 892);
        assert_eq!(summary.period, "2024-01");
        assert!((summary.transaction_percent_used - 1.784).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unbounded_cap_reports_zero_percent() {
        let meter = meter();
        let tenant = Tenant::new("Big", "big", TenantTier::Enterprise);
        let tiers = TierTable::default();
        let period = Period::new(2024, 2);

        meter
            .increment_in(&tenant.id, UsageMetric::Transactions, 1_000_000, period)
            .await
            .unwrap();

        let summary = meter.summary(&tenant, &tiers, Some(period)).await.unwrap();
        assert_eq!(summary.transactions, 1_000_000);
        assert_eq!(summary.transaction_percent_used, 0.0);
    }

    #[tokio::test]
    async fn test_counters_accumulate_independently() {
        let meter = meter();
        let a = Tenant::new("A", "a", TenantTier::Starter);
        let b = Tenant::new("B", "b", TenantTier::Starter);
        let tiers = TierTable::default();

        meter
            .increment(&a.id, UsageMetric::ApiCalls, 5)
            .await
            .unwrap();
        meter
            .increment(&a.id, UsageMetric::BandwidthBytes, 1_024)
            .await
            .unwrap();
        meter
            .increment(&b.id, UsageMetric::ApiCalls, 2)
            .await
            .unwrap();

        let summary_a = meter.summary(&a, &tiers, None).await.unwrap();
        assert_eq!(summary_a.api_calls, 5);
        assert_eq!(summary_a.bandwidth_bytes, 1_024);
        let summary_b = meter.summary(&b, &tiers, None).await.unwrap();
        assert_eq!(summary_b.api_calls, 2);
    }

    #[tokio::test]
    async fn test_history_skips_empty_months() {
        let meter = meter();
        let tenant = Tenant::new("A", "a", TenantTier::Starter);
        let tiers = TierTable::default();

        let current = Period::current();
        let two_back = current.previous().previous();
        meter
            .increment_in(&tenant.id, UsageMetric::Transactions, 7, current)
            .await
            .unwrap();
        meter
            .increment_in(&tenant.id, UsageMetric::Transactions, 3, two_back)
            .await
            .unwrap();

        let history = meter.history(&tenant, &tiers, 6).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].period, current.to_string());
        assert_eq!(history[0].transactions, 7);
        assert_eq!(history[1].period, two_back.to_string());
        assert_eq!(history[1].transactions, 3);
    }
}
