//! Multi-Strategy Tenant Resolver
//!
//! Attributes a request to a tenant from its transport-level signals,
//! consulting the identity cache before the directory. Strategies run in
//! strict priority order and stop at the first hit. Only active tenants
//! resolve; an inactive match is a miss, not an error.

use crate::cache::{keys, TenantCache};
use crate::directory::{DirectoryError, TenantDirectory};
use crate::model::{Tenant, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use settle_common::PlatformConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How a tenant was identified, in descending trust order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Verified claim set carried a tenant identifier
    Claims,
    /// Caller-supplied tenant header (identifier, credential, or slug)
    Header,
    /// Subdomain of the configured base domain
    Subdomain,
    /// Exact custom-domain match
    CustomDomain,
}

impl ResolutionMethod {
    /// Stable name for audit logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claims => "claims",
            Self::Header => "header",
            Self::Subdomain => "subdomain",
            Self::CustomDomain => "custom_domain",
        }
    }
}

/// Transport-level signals a request carries
#[derive(Debug, Clone, Default)]
pub struct RequestSignals {
    /// Decoded, upstream-verified claim set
    pub claims: Option<Map<String, Value>>,
    /// Explicit tenant header value
    pub tenant_header: Option<String>,
    /// Host header
    pub host: Option<String>,
}

/// A successful resolution
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    /// The tenant
    pub tenant: Tenant,
    /// Which strategy matched
    pub method: ResolutionMethod,
}

enum DirectoryLookup<'a> {
    Id(TenantId),
    HeaderValue(&'a str),
    Slug(&'a str),
    Domain(&'a str),
}

/// Multi-strategy resolver
pub struct TenantResolver {
    cache: Arc<dyn TenantCache>,
    directory: Arc<dyn TenantDirectory>,
    base_domain: String,
    cache_ttl: Duration,
}

impl TenantResolver {
    /// Build a resolver over a cache and a directory
    pub fn new(
        cache: Arc<dyn TenantCache>,
        directory: Arc<dyn TenantDirectory>,
        config: &PlatformConfig,
    ) -> Self {
        Self {
            cache,
            directory,
            base_domain: config.base_domain.clone(),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
        }
    }

    /// Resolve the tenant a request belongs to, if any
    pub async fn resolve(
        &self,
        signals: &RequestSignals,
    ) -> Result<Option<ResolvedTenant>, DirectoryError> {
        // 1. Authenticated claims
        if let Some(id) = signals.claims.as_ref().and_then(claim_tenant_id) {
            if let Some(tenant) = self
                .cached_lookup(keys::by_id(&id), DirectoryLookup::Id(id))
                .await?
            {
                return Ok(Some(ResolvedTenant {
                    tenant,
                    method: ResolutionMethod::Claims,
                }));
            }
        }

        // 2. Explicit header: identifier, credential, or slug
        if let Some(value) = signals.tenant_header.as_deref() {
            if let Some(tenant) = self
                .cached_lookup(keys::by_key(value), DirectoryLookup::HeaderValue(value))
                .await?
            {
                return Ok(Some(ResolvedTenant {
                    tenant,
                    method: ResolutionMethod::Header,
                }));
            }
        }

        if let Some(host) = signals.host.as_deref() {
            // 3. Subdomain of the base domain
            if let Some(slug) = subdomain_of(host, &self.base_domain) {
                if let Some(tenant) = self
                    .cached_lookup(keys::by_slug(&slug), DirectoryLookup::Slug(&slug))
                    .await?
                {
                    return Ok(Some(ResolvedTenant {
                        tenant,
                        method: ResolutionMethod::Subdomain,
                    }));
                }
            }

            // 4. Exact custom domain
            let domain = strip_port(host);
            if let Some(tenant) = self
                .cached_lookup(keys::by_domain(domain), DirectoryLookup::Domain(domain))
                .await?
            {
                return Ok(Some(ResolvedTenant {
                    tenant,
                    method: ResolutionMethod::CustomDomain,
                }));
            }
        }

        Ok(None)
    }

    /// Cache-then-directory lookup; cache failures degrade to direct reads
    async fn cached_lookup(
        &self,
        cache_key: String,
        lookup: DirectoryLookup<'_>,
    ) -> Result<Option<Tenant>, DirectoryError> {
        match self.cache.get(&cache_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Tenant>(&raw) {
                Ok(tenant) if tenant.is_active => return Ok(Some(tenant)),
                Ok(_) => return Ok(None),
                Err(err) => {
                    debug!(key = %cache_key, %err, "discarding unreadable cache entry");
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(key = %cache_key, %err, "identity cache unreachable, reading directory");
            }
        }

        let found = self.directory_lookup(&lookup).await?;
        let Some(tenant) = found.filter(|t| t.is_active) else {
            return Ok(None);
        };

        match serde_json::to_string(&tenant) {
            Ok(json) => {
                if let Err(err) = self.cache.put(&cache_key, json, self.cache_ttl).await {
                    warn!(key = %cache_key, %err, "identity cache population failed");
                }
            }
            Err(err) => warn!(key = %cache_key, %err, "tenant snapshot not serializable"),
        }
        Ok(Some(tenant))
    }

    async fn directory_lookup(
        &self,
        lookup: &DirectoryLookup<'_>,
    ) -> Result<Option<Tenant>, DirectoryError> {
        match lookup {
            DirectoryLookup::Id(id) => self.directory.find_by_id(id).await,
            DirectoryLookup::HeaderValue(value) => {
                if let Ok(id) = value.parse::<TenantId>() {
                    if let Some(tenant) = self.directory.find_by_id(&id).await? {
                        return Ok(Some(tenant));
                    }
                }
                if let Some(tenant) = self.directory.find_by_api_key(value).await? {
                    return Ok(Some(tenant));
                }
                self.directory.find_by_slug(value).await
            }
            DirectoryLookup::Slug(slug) => self.directory.find_by_slug(slug).await,
            DirectoryLookup::Domain(domain) => self.directory.find_by_domain(domain).await,
        }
    }
}

/// Tenant identifier from a claim set, under either accepted field name
fn claim_tenant_id(claims: &Map<String, Value>) -> Option<TenantId> {
    claims
        .get("tenant_id")
        .or_else(|| claims.get("tenantId"))?
        .as_str()?
        .parse()
        .ok()
}

/// Host with any `:port` suffix removed
fn strip_port(host: &str) -> &str {
    host.split(':').next().unwrap_or(host)
}

/// Subdomain label immediately preceding the base domain
///
/// `www.bank1.opensettle.io:8443` → `bank1` for base domain `opensettle.io`.
fn subdomain_of(host: &str, base_domain: &str) -> Option<String> {
    let host = strip_port(host);
    let host = host.strip_prefix("www.").unwrap_or(host);
    let stem = host.strip_suffix(base_domain)?.strip_suffix('.')?;
    let label = stem.rsplit('.').next()?;
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, InMemoryTenantCache};
    use crate::directory::InMemoryTenantDirectory;
    use async_trait::async_trait;
    use settle_common::TenantTier;

    struct FailingCache;

    #[async_trait]
    impl TenantCache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn put(
            &self,
            _key: &str,
            _value: String,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
        async fn remove(&self, _keys: &[String]) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    fn resolver_with(
        cache: Arc<dyn TenantCache>,
        directory: Arc<InMemoryTenantDirectory>,
    ) -> TenantResolver {
        let config = PlatformConfig {
            base_domain: "opensettle.io".into(),
            ..PlatformConfig::default()
        };
        TenantResolver::new(cache, directory, &config)
    }

    async fn seed(directory: &InMemoryTenantDirectory, slug: &str) -> Tenant {
        let tenant = Tenant::new(slug, slug, TenantTier::Starter);
        directory.insert(tenant.clone()).await.unwrap();
        tenant
    }

    fn claims_for(id: TenantId) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("tenant_id".into(), Value::String(id.to_string()));
        claims
    }

    #[tokio::test]
    async fn test_claims_beat_conflicting_header() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let a = seed(&directory, "alpha").await;
        let _b = seed(&directory, "beta").await;
        let resolver = resolver_with(Arc::new(InMemoryTenantCache::new()), directory);

        let signals = RequestSignals {
            claims: Some(claims_for(a.id)),
            tenant_header: Some("beta".into()),
            host: None,
        };
        let resolved = resolver.resolve(&signals).await.unwrap().unwrap();
        assert_eq!(resolved.tenant.id, a.id);
        assert_eq!(resolved.method, ResolutionMethod::Claims);
    }

    #[tokio::test]
    async fn test_camel_case_claim_field_accepted() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let a = seed(&directory, "alpha").await;
        let resolver = resolver_with(Arc::new(InMemoryTenantCache::new()), directory);

        let mut claims = Map::new();
        claims.insert("tenantId".into(), Value::String(a.id.to_string()));
        let signals = RequestSignals {
            claims: Some(claims),
            ..Default::default()
        };
        assert!(resolver.resolve(&signals).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_header_prefers_api_key_over_slug() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let mut keyed = Tenant::new("Keyed", "keyed", TenantTier::Starter);
        keyed.api_key = Some("shared-value".into());
        directory.insert(keyed.clone()).await.unwrap();
        let slugged = Tenant::new("Slugged", "shared-value", TenantTier::Starter);
        directory.insert(slugged).await.unwrap();
        let resolver = resolver_with(Arc::new(InMemoryTenantCache::new()), directory);

        let signals = RequestSignals {
            tenant_header: Some("shared-value".into()),
            ..Default::default()
        };
        let resolved = resolver.resolve(&signals).await.unwrap().unwrap();
        assert_eq!(resolved.tenant.id, keyed.id);
        assert_eq!(resolved.method, ResolutionMethod::Header);
    }

    #[tokio::test]
    async fn test_subdomain_resolution_strips_www_and_port() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let bank = seed(&directory, "bank1").await;
        let resolver = resolver_with(Arc::new(InMemoryTenantCache::new()), directory);

        let signals = RequestSignals {
            host: Some("www.bank1.opensettle.io:8443".into()),
            ..Default::default()
        };
        let resolved = resolver.resolve(&signals).await.unwrap().unwrap();
        assert_eq!(resolved.tenant.id, bank.id);
        assert_eq!(resolved.method, ResolutionMethod::Subdomain);
    }

    #[tokio::test]
    async fn test_custom_domain_resolution() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let mut tenant = Tenant::new("Acme", "acme", TenantTier::Professional);
        tenant.domains = vec!["payments.acme.com".into()];
        directory.insert(tenant.clone()).await.unwrap();
        let resolver = resolver_with(Arc::new(InMemoryTenantCache::new()), directory);

        let signals = RequestSignals {
            host: Some("payments.acme.com:443".into()),
            ..Default::default()
        };
        let resolved = resolver.resolve(&signals).await.unwrap().unwrap();
        assert_eq!(resolved.tenant.id, tenant.id);
        assert_eq!(resolved.method, ResolutionMethod::CustomDomain);
    }

    #[tokio::test]
    async fn test_inactive_tenant_is_a_miss() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let mut tenant = Tenant::new("Gone", "gone", TenantTier::Free);
        tenant.is_active = false;
        directory.insert(tenant).await.unwrap();
        let resolver = resolver_with(Arc::new(InMemoryTenantCache::new()), directory);

        let signals = RequestSignals {
            tenant_header: Some("gone".into()),
            ..Default::default()
        };
        assert!(resolver.resolve(&signals).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_directory() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        seed(&directory, "alpha").await;
        let resolver = resolver_with(Arc::new(FailingCache), directory);

        let signals = RequestSignals {
            tenant_header: Some("alpha".into()),
            ..Default::default()
        };
        assert!(resolver.resolve(&signals).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cache_serves_after_directory_loss() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let tenant = seed(&directory, "alpha").await;
        let cache = Arc::new(InMemoryTenantCache::new());
        let resolver = resolver_with(cache.clone(), directory.clone());

        let signals = RequestSignals {
            tenant_header: Some("alpha".into()),
            ..Default::default()
        };
        // first hit populates the cache
        assert!(resolver.resolve(&signals).await.unwrap().is_some());
        assert!(!cache.is_empty());

        // wipe the directory; the snapshot still resolves from cache
        let fresh = Arc::new(InMemoryTenantDirectory::new());
        let resolver = resolver_with(cache, fresh);
        let resolved = resolver.resolve(&signals).await.unwrap().unwrap();
        assert_eq!(resolved.tenant.id, tenant.id);
    }

    #[test]
    fn test_subdomain_edge_cases() {
        assert_eq!(
            subdomain_of("bank1.opensettle.io", "opensettle.io"),
            Some("bank1".into())
        );
        assert_eq!(
            subdomain_of("www.bank1.opensettle.io", "opensettle.io"),
            Some("bank1".into())
        );
        assert_eq!(
            subdomain_of("eu.bank1.opensettle.io", "opensettle.io"),
            Some("bank1".into())
        );
        assert_eq!(subdomain_of("opensettle.io", "opensettle.io"), None);
        assert_eq!(subdomain_of("www.opensettle.io", "opensettle.io"), None);
        assert_eq!(subdomain_of("payments.acme.com", "opensettle.io"), None);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn subdomain_survives_www_and_port(
                slug in "[a-z][a-z0-9-]{0,24}",
                port in 1u16..,
            ) {
                let host = format!("www.{slug}.opensettle.io:{port}");
                prop_assert_eq!(
                    subdomain_of(&host, "opensettle.io"),
                    Some(slug)
                );
            }

            #[test]
            fn port_strip_never_panics(host in "\\PC*") {
                let _ = strip_port(&host);
                let _ = subdomain_of(&host, "opensettle.io");
            }
        }
    }
}
