//! Rate Limiting and Usage Metering
//!
//! Two views of tenant consumption with different horizons: a sliding
//! one-minute window that admits or rejects individual requests, and
//! monthly counters that feed billing and plan-limit checks. Both are
//! backed by shared multi-writer stores, so every mutation is a single
//! atomic store-level operation; the application layer never plays
//! check-then-write across round trips.

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod limiter;
pub mod meter;
pub mod window;

pub use limiter::{RateLimitDecision, RateLimiter};
pub use meter::{
    CounterStore, CounterStoreError, InMemoryCounterStore, Period, UsageMeter, UsageMetric,
    UsageSummary,
};
pub use window::{InMemoryWindowStore, WindowOutcome, WindowStore, WindowStoreError};
