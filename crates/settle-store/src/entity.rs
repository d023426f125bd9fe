//! Tenant-Owned Entity Contract

use serde::de::DeserializeOwned;
use serde::Serialize;
use settle_tenant::TenantId;
use uuid::Uuid;

/// Document field names the gateway scopes on
pub mod fields {
    /// Owning-tenant identifier
    pub const TENANT: &str = "tenant_id";
    /// Soft-delete timestamp; absent or null = live
    pub const DELETED_AT: &str = "deleted_at";
    /// Actor who performed the soft delete
    pub const DELETED_BY: &str = "deleted_by";
    /// Primary identifier
    pub const ID: &str = "id";
}

/// A business record owned by exactly one tenant
///
/// The owning-tenant identifier is stamped at insert from the request
/// context and is never overwritten by any update path. Serialized form
/// must expose the [`fields`] names.
pub trait TenantScoped: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the entity persists into
    const COLLECTION: &'static str;

    /// Primary identifier
    fn id(&self) -> Uuid;

    /// Owning tenant
    fn tenant_id(&self) -> TenantId;

    /// Stamp the owning tenant; called exactly once, at insert
    fn set_tenant_id(&mut self, tenant_id: TenantId);
}
