//! Store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, EventId};
use domain::{CustomerId, Order, Procurement, SagaStatus};

use crate::error::Result;
use crate::outbox_record::OutboxRecord;
use crate::query::ProcurementFilter;

/// Durable keyed storage for orders.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Saves an order with an optimistic version check.
    ///
    /// The given `outbox` records are appended in the same transaction as
    /// the order itself. Returns the order with its bumped version; fails
    /// with `ConcurrencyConflict` if the stored version does not match.
    async fn save_order(&self, order: Order, outbox: Vec<OutboxRecord>) -> Result<Order>;

    /// Loads an order by ID. Returns None if it does not exist.
    async fn get_order(&self, id: AggregateId) -> Result<Option<Order>>;

    /// Lists all orders placed by a customer.
    async fn orders_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Finds orders whose saga is stuck: saga status in `statuses` and last
    /// mutation older than `updated_before`. Used by the recovery sweep.
    async fn stalled_orders(
        &self,
        statuses: &[SagaStatus],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Order>>;
}

/// Durable keyed storage for procurements.
#[async_trait]
pub trait ProcurementStore: Send + Sync {
    /// Saves a procurement with an optimistic version check.
    ///
    /// The given `outbox` records are appended in the same transaction.
    async fn save_procurement(
        &self,
        procurement: Procurement,
        outbox: Vec<OutboxRecord>,
    ) -> Result<Procurement>;

    /// Loads a procurement by ID. Returns None if it does not exist.
    async fn get_procurement(&self, id: AggregateId) -> Result<Option<Procurement>>;

    /// Lists procurements matching the filter.
    async fn list_procurements(&self, filter: &ProcurementFilter) -> Result<Vec<Procurement>>;

    /// Finds procurements with open bidding whose deadline has passed.
    /// Used by the expired-bidding sweep.
    async fn procurements_open_past_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Procurement>>;
}

/// Storage for outbox records, co-located with the aggregate partitions.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Appends records directly, outside an aggregate save.
    async fn append_outbox(&self, records: Vec<OutboxRecord>) -> Result<()>;

    /// Returns up to `limit` unprocessed records with fewer than
    /// `max_retries` failed attempts, oldest first (FIFO per aggregate).
    async fn pending_outbox(&self, max_retries: u32, limit: usize) -> Result<Vec<OutboxRecord>>;

    /// Marks a record as published.
    async fn mark_processed(&self, id: EventId, processed_at: DateTime<Utc>) -> Result<()>;

    /// Increments a record's retry count and stores the error.
    async fn mark_failed(&self, id: EventId, error: &str) -> Result<()>;

    /// Deletes processed records older than the cutoff.
    ///
    /// Unprocessed records are never deleted, regardless of age.
    /// Returns the number of deleted records.
    async fn purge_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
