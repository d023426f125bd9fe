//! OpenSettle Common - Shared types for the multi-tenant platform core
//!
//! This crate provides the pieces every other OpenSettle crate agrees on:
//! - Subscription tiers and the per-tier limit table
//! - Platform configuration loaded from the environment

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod tier;

pub use config::{ConfigError, PlatformConfig};
pub use tier::{TenantTier, TierLimits, TierTable};
