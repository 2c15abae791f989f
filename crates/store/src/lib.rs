//! Aggregate store for the agri-procurement core.
//!
//! The store is the only shared mutable resource in the system. Every save
//! is guarded by an optimistic version check: the update conditions on the
//! expected version and fails loudly with `StoreError::ConcurrencyConflict`
//! on mismatch, never merging or retrying silently.
//!
//! Outbox records are written through the same save call as the aggregate
//! they describe, so the event record and the business mutation commit
//! atomically (one lock critical section in memory, one transaction in
//! PostgreSQL).

mod error;
mod memory;
mod outbox_record;
mod postgres;
mod query;
mod traits;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use outbox_record::OutboxRecord;
pub use postgres::PostgresStore;
pub use query::ProcurementFilter;
pub use traits::{OrderStore, OutboxStore, ProcurementStore};
