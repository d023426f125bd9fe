//! Tenant Data Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settle_common::{TenantTier, TierLimits, TierTable};
use uuid::Uuid;

/// Tenant ID
pub type TenantId = Uuid;

/// Tenant definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    /// Unique tenant ID
    pub id: TenantId,
    /// URL-safe unique slug, used for subdomain lookup
    pub slug: String,
    /// Display name
    pub name: String,
    /// Subscription tier
    pub tier: TenantTier,
    /// Custom domains, globally unique across tenants
    pub domains: Vec<String>,
    /// Branding settings, no isolation relevance
    pub settings: TenantSettings,
    /// Per-tenant overrides of the tier limit table
    pub limit_overrides: Option<TierLimits>,
    /// Deactivated tenants fail resolution
    pub is_active: bool,
    /// API credential, unique and sparse
    pub api_key: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new active tenant
    pub fn new(name: &str, slug: &str, tier: TenantTier) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: name.to_string(),
            tier,
            domains: Vec::new(),
            settings: TenantSettings::default(),
            limit_overrides: None,
            is_active: true,
            api_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Effective limits: per-tenant overrides win over the tier table
    pub fn effective_limits(&self, table: &TierTable) -> TierLimits {
        self.limit_overrides
            .unwrap_or_else(|| table.limits(self.tier))
    }
}

/// Branding settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantSettings {
    /// Primary UI color
    pub primary_color: String,
    /// Logo URL
    pub logo_url: Option<String>,
    /// BCP 47 locale
    pub locale: String,
    /// ISO 4217 currency code
    pub currency: String,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            primary_color: "#0066cc".to_string(),
            logo_url: None,
            locale: "en-US".to_string(),
            currency: "USD".to_string(),
        }
    }
}

/// Tenant creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    /// Display name
    pub name: String,
    /// Unique slug
    pub slug: String,
    /// Subscription tier
    pub tier: TenantTier,
    /// Custom domains
    #[serde(default)]
    pub domains: Vec<String>,
    /// Branding settings
    pub settings: Option<TenantSettings>,
}

/// Tenant update request; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantUpdate {
    /// New display name
    pub name: Option<String>,
    /// New slug
    pub slug: Option<String>,
    /// New tier
    pub tier: Option<TenantTier>,
    /// Replacement domain list
    pub domains: Option<Vec<String>>,
    /// Replacement settings
    pub settings: Option<TenantSettings>,
    /// Replacement limit overrides
    pub limit_overrides: Option<TierLimits>,
    /// Activation flag
    pub is_active: Option<bool>,
}

/// Generate a fresh API credential
pub fn generate_api_key() -> String {
    format!("sk_{}", Uuid::new_v4().simple())
}
