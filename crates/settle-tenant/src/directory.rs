//! Tenant Directory
//!
//! Durable source of truth for tenant records. Owned by an external
//! persistence layer in production; the in-memory implementation backs
//! tests and single-node deployments and enforces the same uniqueness
//! invariants the schema would.

use crate::model::{Tenant, TenantId};
use async_trait::async_trait;
use dashmap::DashMap;

/// Directory error
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// No tenant matched
    #[error("tenant not found")]
    NotFound,
    /// Uniqueness violation on slug, domain, or credential
    #[error("duplicate {field}: {value}")]
    Duplicate {
        /// Violated field
        field: &'static str,
        /// Conflicting value
        value: String,
    },
    /// Store unreachable
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Tenant directory contract
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Find by internal identifier
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, DirectoryError>;

    /// Find by slug
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DirectoryError>;

    /// Find by API credential
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Tenant>, DirectoryError>;

    /// Find by custom domain (exact match)
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DirectoryError>;

    /// Insert a new tenant, enforcing uniqueness
    async fn insert(&self, tenant: Tenant) -> Result<(), DirectoryError>;

    /// Replace an existing tenant record, enforcing uniqueness
    async fn update(&self, tenant: Tenant) -> Result<(), DirectoryError>;

    /// All tenants
    async fn list(&self) -> Result<Vec<Tenant>, DirectoryError>;
}

/// In-memory tenant directory
pub struct InMemoryTenantDirectory {
    tenants: DashMap<TenantId, Tenant>,
}

impl InMemoryTenantDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
        }
    }

    /// Tenant count
    pub fn count(&self) -> usize {
        self.tenants.len()
    }

    fn check_unique(&self, candidate: &Tenant) -> Result<(), DirectoryError> {
        for entry in self.tenants.iter() {
            let other = entry.value();
            if other.id == candidate.id {
                continue;
            }
            if other.slug == candidate.slug {
                return Err(DirectoryError::Duplicate {
                    field: "slug",
                    value: candidate.slug.clone(),
                });
            }
            if let (Some(a), Some(b)) = (&other.api_key, &candidate.api_key) {
                if a == b {
                    return Err(DirectoryError::Duplicate {
                        field: "api_key",
                        value: b.clone(),
                    });
                }
            }
            for domain in &candidate.domains {
                if other.domains.iter().any(|d| d == domain) {
                    return Err(DirectoryError::Duplicate {
                        field: "domain",
                        value: domain.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn find_where<F: Fn(&Tenant) -> bool>(&self, pred: F) -> Option<Tenant> {
        self.tenants
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

impl Default for InMemoryTenantDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.tenants.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.find_where(|t| t.slug == slug))
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.find_where(|t| t.api_key.as_deref() == Some(api_key)))
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DirectoryError> {
        Ok(self.find_where(|t| t.domains.iter().any(|d| d == domain)))
    }

    async fn insert(&self, tenant: Tenant) -> Result<(), DirectoryError> {
        self.check_unique(&tenant)?;
        self.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn update(&self, tenant: Tenant) -> Result<(), DirectoryError> {
        if !self.tenants.contains_key(&tenant.id) {
            return Err(DirectoryError::NotFound);
        }
        self.check_unique(&tenant)?;
        self.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Tenant>, DirectoryError> {
        Ok(self
            .tenants
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_common::TenantTier;

    #[tokio::test]
    async fn test_insert_and_lookups() {
        let dir = InMemoryTenantDirectory::new();
        let mut tenant = Tenant::new("Acme", "acme", TenantTier::Starter);
        tenant.api_key = Some("sk_1".into());
        tenant.domains = vec!["pay.acme.com".into()];
        dir.insert(tenant.clone()).await.unwrap();

        assert!(dir.find_by_id(&tenant.id).await.unwrap().is_some());
        assert!(dir.find_by_slug("acme").await.unwrap().is_some());
        assert!(dir.find_by_api_key("sk_1").await.unwrap().is_some());
        assert!(dir.find_by_domain("pay.acme.com").await.unwrap().is_some());
        assert!(dir.find_by_slug("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slug_uniqueness() {
        let dir = InMemoryTenantDirectory::new();
        dir.insert(Tenant::new("A", "acme", TenantTier::Free))
            .await
            .unwrap();

        let err = dir
            .insert(Tenant::new("B", "acme", TenantTier::Free))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Duplicate { field: "slug", .. }));
    }

    #[tokio::test]
    async fn test_domain_uniqueness_across_tenants() {
        let dir = InMemoryTenantDirectory::new();
        let mut a = Tenant::new("A", "a", TenantTier::Free);
        a.domains = vec!["pay.shared.com".into()];
        dir.insert(a).await.unwrap();

        let mut b = Tenant::new("B", "b", TenantTier::Free);
        b.domains = vec!["pay.shared.com".into()];
        let err = dir.insert(b).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Duplicate { field: "domain", .. }));
    }

    #[tokio::test]
    async fn test_update_missing() {
        let dir = InMemoryTenantDirectory::new();
        let tenant = Tenant::new("A", "a", TenantTier::Free);
        assert!(matches!(
            dir.update(tenant).await.unwrap_err(),
            DirectoryError::NotFound
        ));
    }
}
