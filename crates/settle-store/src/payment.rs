//! Payment Records
//!
//! The first entity carried by the platform and the reference pattern for
//! every other tenant-owned repository: a thin typed layer over
//! [`TenantCollection`], which does all the scoping work.

use crate::entity::TenantScoped;
use crate::gateway::{GatewayError, ReadOptions, TenantCollection};
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use settle_tenant::TenantId;
use std::sync::Arc;
use uuid::Uuid;

/// Payment lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Accepted, not yet processed
    Pending,
    /// Handed to the processor
    Processing,
    /// Settled
    Completed,
    /// Rejected or errored
    Failed,
    /// Settled, then returned
    Refunded,
}

/// A payment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Primary identifier
    pub id: Uuid,
    /// Owning tenant, stamped by the gateway at insert
    pub tenant_id: TenantId,
    /// Amount in minor units
    pub amount_cents: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Lifecycle state
    pub status: PaymentStatus,
    /// Caller-supplied reference, unique per tenant by convention
    pub reference: String,
    /// Payer contact
    pub customer_email: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp; `None` = live
    pub deleted_at: Option<DateTime<Utc>>,
    /// Actor who soft-deleted the record
    pub deleted_by: Option<String>,
}

/// Payment creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    /// Amount in minor units
    pub amount_cents: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Caller-supplied reference
    pub reference: String,
    /// Payer contact
    pub customer_email: Option<String>,
}

impl Payment {
    /// Build an unstamped record; the gateway assigns the owner at insert
    pub fn draft(new: NewPayment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            amount_cents: new.amount_cents,
            currency: new.currency,
            status: PaymentStatus::Pending,
            reference: new.reference,
            customer_email: new.customer_email,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            deleted_by: None,
        }
    }
}

impl TenantScoped for Payment {
    const COLLECTION: &'static str = "payments";

    fn id(&self) -> Uuid {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: TenantId) {
        self.tenant_id = tenant_id;
    }
}

/// Per-status rollup returned by [`PaymentRepository::status_totals`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTotal {
    /// Lifecycle state
    pub status: String,
    /// Number of live payments in that state
    pub count: i64,
    /// Summed amount in minor units
    pub total_cents: i64,
}

/// Typed repository over the scoped payment collection
#[derive(Clone)]
pub struct PaymentRepository {
    collection: TenantCollection<Payment>,
}

impl PaymentRepository {
    /// Build a repository over a document store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            collection: TenantCollection::new(store),
        }
    }

    /// Record a new payment for the context tenant
    pub async fn create(&self, new: NewPayment) -> Result<Payment, GatewayError> {
        self.collection.insert(Payment::draft(new)).await
    }

    /// Fetch one payment
    pub async fn get(&self, id: Uuid) -> Result<Option<Payment>, GatewayError> {
        self.collection.find_by_id(id).await
    }

    /// Live payments, optionally narrowed to one status
    pub async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<Payment>, GatewayError> {
        let filter = match status {
            Some(status) => json!({ "status": status }),
            None => json!({}),
        };
        self.collection.find(filter).await
    }

    /// Live and soft-deleted payments
    pub async fn list_with_deleted(&self) -> Result<Vec<Payment>, GatewayError> {
        self.collection
            .find_with(
                json!({}),
                ReadOptions {
                    include_deleted: true,
                },
            )
            .await
    }

    /// Move a payment to a new lifecycle state
    pub async fn mark_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Payment, GatewayError> {
        self.collection.update(id, json!({ "status": status })).await
    }

    /// Soft delete
    pub async fn soft_delete(&self, id: Uuid, actor: Option<&str>) -> Result<(), GatewayError> {
        self.collection.soft_delete(id, actor).await
    }

    /// Undo a soft delete
    pub async fn restore(&self, id: Uuid) -> Result<Payment, GatewayError> {
        self.collection.restore(id).await
    }

    /// Physically remove a payment; administrative use
    pub async fn purge(&self, id: Uuid) -> Result<(), GatewayError> {
        self.collection.purge(id).await
    }

    /// Count and sum live payments per status
    pub async fn status_totals(&self) -> Result<Vec<StatusTotal>, GatewayError> {
        let rows = self
            .collection
            .aggregate(vec![
                json!({ "$group": {
                    "_id": "$status",
                    "count": { "$sum": 1 },
                    "total_cents": { "$sum": "$amount_cents" },
                }}),
                json!({ "$sort": { "total_cents": -1 } }),
            ])
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(StatusTotal {
                    status: row.get("_id")?.as_str()?.to_string(),
                    count: row.get("count")?.as_i64()?,
                    total_cents: row.get("total_cents")?.as_i64()?,
                })
            })
            .collect())
    }
}
