//! Platform Configuration
//!
//! Environment-driven settings. Nothing in the resolver or limiter is
//! hardcoded; everything routing- or limit-relevant flows through here.

use crate::tier::{TenantTier, TierTable};
use serde::{Deserialize, Serialize};

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was present but not parseable
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Environment key
        key: String,
        /// Offending value
        value: String,
    },
}

/// Platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base domain for subdomain tenant resolution (e.g. `opensettle.io`)
    pub base_domain: String,
    /// TTL for identity cache entries, seconds
    pub cache_ttl_secs: u64,
    /// Sliding rate-limit window, milliseconds
    pub rate_window_ms: u64,
    /// Retention for usage counters, days
    pub usage_retention_days: u32,
    /// HTTP bind address
    pub bind_addr: String,
    /// Secret for decoding upstream-issued JWTs
    pub jwt_secret: String,
    /// Per-tier limit table
    pub tiers: TierTable,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_domain: "opensettle.io".to_string(),
            cache_ttl_secs: 300,
            rate_window_ms: 60_000,
            usage_retention_days: 90,
            bind_addr: "0.0.0.0:8080".to_string(),
            jwt_secret: "change-me".to_string(),
            tiers: TierTable::default(),
        }
    }
}

impl PlatformConfig {
    /// Load configuration from the environment, falling back to defaults
    ///
    /// Tier limits can be overridden per tier, e.g.
    /// `SETTLE_TIER_STARTER_RPM=120` or `SETTLE_TIER_PROFESSIONAL_TX=75000`
    /// (`TX=0` lifts the cap entirely).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("SETTLE_BASE_DOMAIN") {
            config.base_domain = v;
        }
        if let Ok(v) = std::env::var("SETTLE_BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Ok(v) = std::env::var("SETTLE_JWT_SECRET") {
            config.jwt_secret = v;
        }
        config.cache_ttl_secs = parse_var("SETTLE_CACHE_TTL_SECS", config.cache_ttl_secs)?;
        config.rate_window_ms = parse_var("SETTLE_RATE_WINDOW_MS", config.rate_window_ms)?;
        config.usage_retention_days =
            parse_var("SETTLE_USAGE_RETENTION_DAYS", config.usage_retention_days)?;

        for tier in TenantTier::all() {
            let limits = config.tiers.limits_mut(tier);
            limits.requests_per_minute = parse_var(
                &format!("SETTLE_TIER_{}_RPM", tier.as_str()),
                limits.requests_per_minute,
            )?;
            limits.max_users = parse_var(
                &format!("SETTLE_TIER_{}_USERS", tier.as_str()),
                limits.max_users,
            )?;
            let tx_key = format!("SETTLE_TIER_{}_TX", tier.as_str());
            if let Ok(raw) = std::env::var(&tx_key) {
                let parsed: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: tx_key,
                    value: raw,
                })?;
                limits.monthly_transactions = if parsed == 0 { None } else { Some(parsed) };
            }
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.rate_window_ms, 60_000);
        assert_eq!(config.tiers.starter.requests_per_minute, 60);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("SETTLE_TIER_STARTER_RPM", "120");
        let config = PlatformConfig::from_env().unwrap();
        assert_eq!(config.tiers.starter.requests_per_minute, 120);
        std::env::remove_var("SETTLE_TIER_STARTER_RPM");
    }
}
