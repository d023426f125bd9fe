//! Shared API State

use settle_common::PlatformConfig;
use settle_limits::{InMemoryCounterStore, InMemoryWindowStore, RateLimiter, UsageMeter};
use settle_store::{DocumentStore, InMemoryDocumentStore, PaymentRepository};
use settle_tenant::{
    InMemoryTenantCache, InMemoryTenantDirectory, TenantCache, TenantDirectory, TenantRegistry,
    TenantResolver,
};
use std::sync::Arc;

/// Everything a request handler can reach
pub struct ApiState {
    /// Platform configuration
    pub config: PlatformConfig,
    /// Multi-strategy tenant resolver
    pub resolver: TenantResolver,
    /// Administrative tenant lifecycle
    pub registry: TenantRegistry,
    /// Sliding-window rate limiter
    pub limiter: RateLimiter,
    /// Monthly usage meter
    pub meter: Arc<UsageMeter>,
    /// Tenant-scoped payment repository
    pub payments: PaymentRepository,
}

impl ApiState {
    /// Wire the engine over in-memory stores; single-node and test setup
    pub fn new(config: PlatformConfig) -> Self {
        let cache: Arc<dyn TenantCache> = Arc::new(InMemoryTenantCache::new());
        let directory: Arc<dyn TenantDirectory> = Arc::new(InMemoryTenantDirectory::new());
        let documents: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());

        Self {
            resolver: TenantResolver::new(cache.clone(), directory.clone(), &config),
            registry: TenantRegistry::new(directory, cache),
            limiter: RateLimiter::new(Arc::new(InMemoryWindowStore::new()), &config),
            meter: Arc::new(UsageMeter::new(
                Arc::new(InMemoryCounterStore::new()),
                config.usage_retention_days,
            )),
            payments: PaymentRepository::new(documents),
            config,
        }
    }
}
