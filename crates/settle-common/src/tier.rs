//! Subscription Tiers and Limit Tables

use serde::{Deserialize, Serialize};

/// Subscription tier, ordered by ascending limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TenantTier {
    /// Evaluation accounts
    Free,
    /// Entry-level paid plan
    Starter,
    /// Mid-market plan
    Professional,
    /// Custom contracts, effectively unbounded
    Enterprise,
}

impl TenantTier {
    /// All tiers in ascending order
    pub fn all() -> [TenantTier; 4] {
        [
            Self::Free,
            Self::Starter,
            Self::Professional,
            Self::Enterprise,
        ]
    }

    /// Stable name used in configuration keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Starter => "STARTER",
            Self::Professional => "PROFESSIONAL",
            Self::Enterprise => "ENTERPRISE",
        }
    }
}

/// Numeric limits attached to a tier
///
/// `monthly_transactions` of `None` means unbounded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierLimits {
    /// Seats the tenant may provision
    pub max_users: u32,
    /// Transaction cap per calendar month, `None` = unbounded
    pub monthly_transactions: Option<u64>,
    /// API requests per minute
    pub requests_per_minute: u32,
}

/// Per-tier limit table, supplied by configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierTable {
    /// Limits for [`TenantTier::Free`]
    pub free: TierLimits,
    /// Limits for [`TenantTier::Starter`]
    pub starter: TierLimits,
    /// Limits for [`TenantTier::Professional`]
    pub professional: TierLimits,
    /// Limits for [`TenantTier::Enterprise`]
    pub enterprise: TierLimits,
}

impl TierTable {
    /// Limits for the given tier
    pub fn limits(&self, tier: TenantTier) -> TierLimits {
        match tier {
            TenantTier::Free => self.free,
            TenantTier::Starter => self.starter,
            TenantTier::Professional => self.professional,
            TenantTier::Enterprise => self.enterprise,
        }
    }

    /// Mutable limits for the given tier
    pub fn limits_mut(&mut self, tier: TenantTier) -> &mut TierLimits {
        match tier {
            TenantTier::Free => &mut self.free,
            TenantTier::Starter => &mut self.starter,
            TenantTier::Professional => &mut self.professional,
            TenantTier::Enterprise => &mut self.enterprise,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            free: TierLimits {
                max_users: 3,
                monthly_transactions: Some(100),
                requests_per_minute: 10,
            },
            starter: TierLimits {
                max_users: 10,
                monthly_transactions: Some(10_000),
                requests_per_minute: 60,
            },
            professional: TierLimits {
                max_users: 50,
                monthly_transactions: Some(50_000),
                requests_per_minute: 300,
            },
            enterprise: TierLimits {
                max_users: u32::MAX,
                monthly_transactions: None,
                requests_per_minute: 1_000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(TenantTier::Free < TenantTier::Starter);
        assert!(TenantTier::Starter < TenantTier::Professional);
        assert!(TenantTier::Professional < TenantTier::Enterprise);
    }

    #[test]
    fn test_limits_increase_with_tier() {
        let table = TierTable::default();
        let mut last_rpm = 0;
        for tier in TenantTier::all() {
            let limits = table.limits(tier);
            assert!(limits.requests_per_minute > last_rpm);
            last_rpm = limits.requests_per_minute;
        }
    }

    #[test]
    fn test_enterprise_unbounded_transactions() {
        let table = TierTable::default();
        assert_eq!(table.limits(TenantTier::Enterprise).monthly_transactions, None);
        assert_eq!(
            table.limits(TenantTier::Professional).monthly_transactions,
            Some(50_000)
        );
    }
}
