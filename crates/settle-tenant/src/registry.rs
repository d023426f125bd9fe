//! Tenant Lifecycle Management
//!
//! Administrative create/update/deactivate over the directory, with the
//! cache invalidation the resolver depends on: any mutation that changes
//! slug, domains, or credential removes every cache entry keyed by the old
//! values before the directory write commits, so stale routing cannot
//! outlive a change.

use crate::cache::{keys, TenantCache};
use crate::directory::{DirectoryError, TenantDirectory};
use crate::model::{generate_api_key, NewTenant, Tenant, TenantId, TenantUpdate};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Tenant registry
pub struct TenantRegistry {
    directory: Arc<dyn TenantDirectory>,
    cache: Arc<dyn TenantCache>,
}

impl TenantRegistry {
    /// Build a registry over a directory and the identity cache
    pub fn new(directory: Arc<dyn TenantDirectory>, cache: Arc<dyn TenantCache>) -> Self {
        Self { directory, cache }
    }

    /// Create a tenant
    pub async fn create(&self, new: NewTenant) -> Result<Tenant, DirectoryError> {
        let mut tenant = Tenant::new(&new.name, &new.slug, new.tier);
        tenant.domains = new.domains;
        if let Some(settings) = new.settings {
            tenant.settings = settings;
        }

        self.invalidate(&tenant).await;
        self.directory.insert(tenant.clone()).await?;
        info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant created");
        Ok(tenant)
    }

    /// Fetch a tenant by id
    pub async fn get(&self, id: &TenantId) -> Result<Tenant, DirectoryError> {
        self.directory
            .find_by_id(id)
            .await?
            .ok_or(DirectoryError::NotFound)
    }

    /// All tenants, active and not
    pub async fn list(&self) -> Result<Vec<Tenant>, DirectoryError> {
        self.directory.list().await
    }

    /// Apply an update, invalidating cache entries for the old identity
    /// values before the directory write
    pub async fn update(
        &self,
        id: &TenantId,
        update: TenantUpdate,
    ) -> Result<Tenant, DirectoryError> {
        let before = self.get(id).await?;
        self.invalidate(&before).await;

        let mut tenant = before;
        if let Some(name) = update.name {
            tenant.name = name;
        }
        if let Some(slug) = update.slug {
            tenant.slug = slug;
        }
        if let Some(tier) = update.tier {
            tenant.tier = tier;
        }
        if let Some(domains) = update.domains {
            tenant.domains = domains;
        }
        if let Some(settings) = update.settings {
            tenant.settings = settings;
        }
        if let Some(overrides) = update.limit_overrides {
            tenant.limit_overrides = Some(overrides);
        }
        if let Some(active) = update.is_active {
            tenant.is_active = active;
        }
        tenant.updated_at = Utc::now();

        self.directory.update(tenant.clone()).await?;
        info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant updated");
        Ok(tenant)
    }

    /// Deactivate a tenant; records are kept, resolution stops
    pub async fn deactivate(&self, id: &TenantId) -> Result<Tenant, DirectoryError> {
        let tenant = self.get(id).await?;
        self.invalidate(&tenant).await;

        let mut tenant = tenant;
        tenant.is_active = false;
        tenant.updated_at = Utc::now();
        self.directory.update(tenant.clone()).await?;
        info!(tenant_id = %tenant.id, "tenant deactivated");
        Ok(tenant)
    }

    /// Issue a fresh API credential, revoking the old one everywhere
    pub async fn regenerate_api_key(&self, id: &TenantId) -> Result<Tenant, DirectoryError> {
        let tenant = self.get(id).await?;
        self.invalidate(&tenant).await;

        let mut tenant = tenant;
        tenant.api_key = Some(generate_api_key());
        tenant.updated_at = Utc::now();
        self.directory.update(tenant.clone()).await?;
        info!(tenant_id = %tenant.id, "api key regenerated");
        Ok(tenant)
    }

    /// Drop every cache entry the snapshot may be reachable under
    async fn invalidate(&self, tenant: &Tenant) {
        let stale = keys::for_tenant(tenant);
        if let Err(err) = self.cache.remove(&stale).await {
            warn!(tenant_id = %tenant.id, %err, "cache invalidation failed");
        }
    }
}
