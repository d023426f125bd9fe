//! Isolation-Enforcing Data Gateway
//!
//! Every entity-specific repository is built on [`TenantCollection`], which
//! derives the acting tenant from the ambient request context and merges it
//! into every read and write. Cross-tenant visibility is structurally
//! unavailable through the normal path; the one bypass is explicit, named,
//! and audited.
//!
//! ```text
//! handler ──▶ PaymentRepository ──▶ TenantCollection<Payment> ──▶ DocumentStore
//!                                        │
//!                              tenant_id from task-local context,
//!                              never from caller-supplied data
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod entity;
pub mod gateway;
pub mod payment;
pub mod store;

pub use entity::{fields, TenantScoped};
pub use gateway::{GatewayError, ReadOptions, TenantCollection, UnscopedCollection};
pub use payment::{NewPayment, Payment, PaymentRepository, PaymentStatus, StatusTotal};
pub use store::{DocumentStore, InMemoryDocumentStore, StoreError};
