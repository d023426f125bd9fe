//! Request Middleware
//!
//! Ordered per request: claims extraction → tenant resolution → guard →
//! rate limiting. The resolution layer owns the context scope; everything
//! downstream, handlers included, runs inside it.

pub mod claims;
pub mod rate_limit;
pub mod tenancy;

pub use claims::{extract_claims, ClaimSet};
pub use rate_limit::rate_limit;
pub use tenancy::{require_admin, require_tenant, resolve_tenant};
