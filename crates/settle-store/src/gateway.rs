//! Tenant-Scoped Collection Gateway
//!
//! Wraps a [`DocumentStore`] so that every operation is scoped to the
//! tenant in the ambient request context. Reads merge an owner-equality
//! and a liveness clause; writes stamp the owner and strip any attempt to
//! reassign it; a caller filter that names a foreign tenant fails with an
//! access-denied error instead of being silently rewritten.

use crate::entity::{fields, TenantScoped};
use crate::store::{DocumentStore, StoreError};
use chrono::Utc;
use serde_json::{json, Map, Value};
use settle_tenant::context;
use settle_tenant::{ContextError, TenantId};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Gateway error
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Caller filter named a tenant other than the context tenant
    #[error("cross-tenant access denied")]
    CrossTenant {
        /// The foreign value the caller asked for
        requested: String,
    },
    /// Operation ran outside any tenant scope
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Backing store failure
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Entity could not be (de)serialized
    #[error("entity serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// No record matched
    #[error("record not found")]
    NotFound,
}

/// Read options; the default excludes soft-deleted rows
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Include soft-deleted rows in results
    pub include_deleted: bool,
}

/// Tenant-scoped access to one entity collection
pub struct TenantCollection<E> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for TenantCollection<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: TenantScoped> TenantCollection<E> {
    /// Build a scoped collection over a document store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Documents matching `filter`, scoped to the context tenant, live only
    pub async fn find(&self, filter: Value) -> Result<Vec<E>, GatewayError> {
        self.find_with(filter, ReadOptions::default()).await
    }

    /// Documents matching `filter` with explicit read options
    pub async fn find_with(
        &self,
        filter: Value,
        options: ReadOptions,
    ) -> Result<Vec<E>, GatewayError> {
        let filter = self.scoped_filter(filter, options)?;
        let docs = self.store.find(E::COLLECTION, &filter).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(GatewayError::from))
            .collect()
    }

    /// First document matching `filter`
    pub async fn find_one(&self, filter: Value) -> Result<Option<E>, GatewayError> {
        let filter = self.scoped_filter(filter, ReadOptions::default())?;
        match self.store.find_one(E::COLLECTION, &filter).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Lookup by primary identifier
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<E>, GatewayError> {
        self.find_one(json!({ fields::ID: id })).await
    }

    /// Insert, stamping the owning tenant from the context
    pub async fn insert(&self, mut entity: E) -> Result<E, GatewayError> {
        let tenant_id = context::current_tenant_id()?;
        entity.set_tenant_id(tenant_id);
        let doc = serde_json::to_value(&entity)?;
        self.store.insert(E::COLLECTION, doc).await?;
        Ok(entity)
    }

    /// Patch one record by id
    ///
    /// Any owner reassignment in the payload is stripped, not honored.
    pub async fn update(&self, id: Uuid, patch: Value) -> Result<E, GatewayError> {
        let mut patch = as_object(patch)?;
        if patch.remove(fields::TENANT).is_some() {
            debug!(
                collection = E::COLLECTION,
                "stripped owner reassignment from update payload"
            );
        }
        patch.insert("updated_at".into(), json!(Utc::now()));

        let filter = self.scoped_filter(json!({ fields::ID: id }), ReadOptions::default())?;
        let matched = self
            .store
            .update_one(E::COLLECTION, &filter, &Value::Object(patch))
            .await?;
        if matched == 0 {
            return Err(GatewayError::NotFound);
        }
        self.find_by_id(id).await?.ok_or(GatewayError::NotFound)
    }

    /// Soft delete: set the deletion timestamp, first write wins
    ///
    /// Deleting an already-deleted record is a no-op success.
    pub async fn soft_delete(&self, id: Uuid, actor: Option<&str>) -> Result<(), GatewayError> {
        let filter = self.scoped_filter(json!({ fields::ID: id }), ReadOptions::default())?;
        let patch = json!({
            fields::DELETED_AT: Utc::now(),
            fields::DELETED_BY: actor,
        });
        let matched = self.store.update_one(E::COLLECTION, &filter, &patch).await?;
        if matched > 0 {
            return Ok(());
        }

        // no live row: either already deleted (fine) or truly missing
        let any = self.scoped_filter(
            json!({ fields::ID: id }),
            ReadOptions {
                include_deleted: true,
            },
        )?;
        match self.store.find_one(E::COLLECTION, &any).await? {
            Some(_) => Ok(()),
            None => Err(GatewayError::NotFound),
        }
    }

    /// Clear the deletion timestamp
    pub async fn restore(&self, id: Uuid) -> Result<E, GatewayError> {
        let filter = self.scoped_filter(
            json!({ fields::ID: id }),
            ReadOptions {
                include_deleted: true,
            },
        )?;
        let patch = json!({ fields::DELETED_AT: null, fields::DELETED_BY: null });
        let matched = self.store.update_one(E::COLLECTION, &filter, &patch).await?;
        if matched == 0 {
            return Err(GatewayError::NotFound);
        }
        self.find_by_id(id).await?.ok_or(GatewayError::NotFound)
    }

    /// Physically remove one record; privileged path, still tenant-scoped
    pub async fn purge(&self, id: Uuid) -> Result<(), GatewayError> {
        let filter = self.scoped_filter(
            json!({ fields::ID: id }),
            ReadOptions {
                include_deleted: true,
            },
        )?;
        let removed = self.store.delete_one(E::COLLECTION, &filter).await?;
        if removed == 0 {
            return Err(GatewayError::NotFound);
        }
        warn!(collection = E::COLLECTION, %id, "record physically purged");
        Ok(())
    }

    /// Run a pipeline with the tenant-and-liveness clause injected as the
    /// first stage and into every nested join pipeline
    pub async fn aggregate(&self, stages: Vec<Value>) -> Result<Vec<Value>, GatewayError> {
        let tenant_id = context::current_tenant_id()?;
        let pipeline = scope_pipeline(stages, &tenant_id);
        Ok(self.store.aggregate(E::COLLECTION, &pipeline).await?)
    }

    /// Cross-tenant bypass for administrative operations
    ///
    /// Never the default; callers pair this with their own authorization
    /// check, and every operation is logged with the actor for audit.
    pub fn unscoped(&self, actor: &str) -> UnscopedCollection<E> {
        UnscopedCollection {
            store: self.store.clone(),
            actor: actor.to_string(),
            _entity: PhantomData,
        }
    }

    /// Merge tenant and liveness clauses into a caller filter
    ///
    /// A caller filter that names the owner field with a foreign value is
    /// rejected outright; silently overriding it would mask programming
    /// errors and injection attempts.
    fn scoped_filter(
        &self,
        filter: Value,
        options: ReadOptions,
    ) -> Result<Value, GatewayError> {
        let tenant_id = context::current_tenant_id()?;
        let expected = json!(tenant_id);
        let mut filter = as_object(filter)?;

        if let Some(requested) = filter.get(fields::TENANT) {
            if *requested != expected {
                error!(
                    collection = E::COLLECTION,
                    tenant_id = %tenant_id,
                    requested = %requested,
                    "cross-tenant filter rejected"
                );
                return Err(GatewayError::CrossTenant {
                    requested: requested.to_string(),
                });
            }
        }
        filter.insert(fields::TENANT.into(), expected);
        if !options.include_deleted && !filter.contains_key(fields::DELETED_AT) {
            filter.insert(fields::DELETED_AT.into(), Value::Null);
        }
        Ok(Value::Object(filter))
    }
}

/// Cross-tenant handle returned by [`TenantCollection::unscoped`]
pub struct UnscopedCollection<E> {
    store: Arc<dyn DocumentStore>,
    actor: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: TenantScoped> UnscopedCollection<E> {
    /// Find across all tenants
    pub async fn find(&self, filter: Value) -> Result<Vec<E>, GatewayError> {
        self.audit("find");
        let docs = self.store.find(E::COLLECTION, &filter).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(GatewayError::from))
            .collect()
    }

    /// Find one record across all tenants
    pub async fn find_one(&self, filter: Value) -> Result<Option<E>, GatewayError> {
        self.audit("find_one");
        match self.store.find_one(E::COLLECTION, &filter).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Physically remove across all tenants
    pub async fn delete_one(&self, filter: Value) -> Result<u64, GatewayError> {
        self.audit("delete_one");
        Ok(self.store.delete_one(E::COLLECTION, &filter).await?)
    }

    fn audit(&self, operation: &str) {
        warn!(
            actor = %self.actor,
            collection = E::COLLECTION,
            operation,
            "tenant scoping bypassed"
        );
    }
}

/// Prepend the scoping `$match` and push it into nested join pipelines
fn scope_pipeline(stages: Vec<Value>, tenant_id: &TenantId) -> Vec<Value> {
    let clause = json!({ fields::TENANT: tenant_id, fields::DELETED_AT: null });
    let mut scoped = Vec::with_capacity(stages.len() + 1);
    scoped.push(json!({ "$match": clause }));
    scoped.extend(stages.into_iter().map(|stage| scope_stage(stage, &clause)));
    scoped
}

fn scope_stage(stage: Value, clause: &Value) -> Value {
    let Value::Object(mut obj) = stage else {
        return stage;
    };
    if let Some(Value::Object(lookup)) = obj.get_mut("$lookup") {
        match lookup.get_mut("pipeline") {
            Some(Value::Array(nested)) => {
                let inner: Vec<Value> = std::mem::take(nested)
                    .into_iter()
                    .map(|stage| scope_stage(stage, clause))
                    .collect();
                let mut rebuilt = Vec::with_capacity(inner.len() + 1);
                rebuilt.push(json!({ "$match": clause }));
                rebuilt.extend(inner);
                *nested = rebuilt;
            }
            _ => {
                // latent leak risk: the joined collection cannot be scoped
                warn!(
                    from = lookup.get("from").and_then(|v| v.as_str()).unwrap_or("?"),
                    "unfilterable $lookup stage passed through"
                );
            }
        }
    }
    Value::Object(obj)
}

fn as_object(value: Value) -> Result<Map<String, Value>, GatewayError> {
    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(GatewayError::Store(StoreError::Malformed(format!(
            "expected object, got {other}"
        )))),
    }
}
