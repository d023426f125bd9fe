//! Identity Cache
//!
//! Low-latency key-value store for tenant snapshots. The backing store is
//! external (anything with TTL semantics); this module owns the contract,
//! the key namespace, and an in-memory implementation for tests and
//! single-node deployments.

use crate::model::{Tenant, TenantId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Cache error
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backing store unreachable; callers degrade to directory reads
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Identity cache contract
///
/// Values are serialized tenant snapshots. Implementations must expire
/// entries after the supplied TTL without relying on active pruning.
#[async_trait]
pub trait TenantCache: Send + Sync {
    /// Fetch a raw entry
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store an entry with a TTL
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Delete entries; missing keys are not an error
    async fn remove(&self, keys: &[String]) -> Result<(), CacheError>;
}

/// Stable cache keys, one namespace per lookup type
pub mod keys {
    use super::{Tenant, TenantId};

    /// Lookup by internal identifier
    pub fn by_id(id: &TenantId) -> String {
        format!("tenant:id:{id}")
    }

    /// Lookup by slug
    pub fn by_slug(slug: &str) -> String {
        format!("tenant:slug:{slug}")
    }

    /// Lookup by the caller-supplied header value (credential or slug)
    pub fn by_key(value: &str) -> String {
        format!("tenant:key:{value}")
    }

    /// Lookup by custom domain
    pub fn by_domain(domain: &str) -> String {
        format!("tenant:domain:{domain}")
    }

    /// Every key under which this snapshot may be cached
    pub fn for_tenant(tenant: &Tenant) -> Vec<String> {
        let mut all = vec![
            by_id(&tenant.id),
            by_slug(&tenant.slug),
            by_key(&tenant.id.to_string()),
            by_key(&tenant.slug),
        ];
        if let Some(api_key) = &tenant.api_key {
            all.push(by_key(api_key));
        }
        for domain in &tenant.domains {
            all.push(by_domain(domain));
        }
        all
    }
}

/// In-memory identity cache with lazy TTL expiry
pub struct InMemoryTenantCache {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryTenantCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Live entry count (expired entries may still be counted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryTenantCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantCache for InMemoryTenantCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            let (value, deadline) = entry.value();
            if Instant::now() < *deadline {
                return Ok(Some(value.clone()));
            }
        }
        // expired entries are dropped on the next touch
        self.entries
            .remove_if(key, |_, (_, deadline)| Instant::now() >= *deadline);
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}
