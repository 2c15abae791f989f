//! In-memory store implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, EventId, Version};
use domain::{AggregateRoot, CustomerId, Order, Procurement, ProcurementStatus, SagaStatus};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::outbox_record::OutboxRecord;
use crate::query::ProcurementFilter;
use crate::traits::{OrderStore, OutboxStore, ProcurementStore};

#[derive(Default)]
struct Inner {
    orders: HashMap<AggregateId, Order>,
    procurements: HashMap<AggregateId, Procurement>,
    // Insertion order doubles as creation order for FIFO relay selection.
    outbox: Vec<OutboxRecord>,
}

/// In-memory store implementation.
///
/// All three stores share one lock, so an aggregate save and its outbox
/// records commit in a single critical section, mirroring the transactional
/// co-commit of the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all outbox records, in creation order.
    pub async fn outbox_records(&self) -> Vec<OutboxRecord> {
        self.inner.read().await.outbox.clone()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Clears all state.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.orders.clear();
        inner.procurements.clear();
        inner.outbox.clear();
    }
}

/// Version-checked upsert shared by both aggregate maps.
fn checked_upsert<T: AggregateRoot + Clone>(
    map: &mut HashMap<AggregateId, T>,
    mut aggregate: T,
) -> Result<T> {
    let id = aggregate.id();
    let expected = aggregate.version();
    let actual = map
        .get(&id)
        .map(|existing| existing.version())
        .unwrap_or(Version::initial());

    if actual != expected {
        return Err(StoreError::ConcurrencyConflict {
            aggregate_type: T::aggregate_type(),
            id,
            expected,
            actual,
        });
    }

    aggregate.set_version(expected.next());
    map.insert(id, aggregate.clone());
    Ok(aggregate)
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn save_order(&self, order: Order, outbox: Vec<OutboxRecord>) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let saved = checked_upsert(&mut inner.orders, order)?;
        inner.outbox.extend(outbox);
        Ok(saved)
    }

    async fn get_order(&self, id: AggregateId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn orders_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.customer_id() == customer_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at());
        Ok(orders)
    }

    async fn stalled_orders(
        &self,
        statuses: &[SagaStatus],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| statuses.contains(&o.saga_status()) && o.updated_at() < updated_before)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.updated_at());
        Ok(orders)
    }
}

#[async_trait]
impl ProcurementStore for InMemoryStore {
    async fn save_procurement(
        &self,
        procurement: Procurement,
        outbox: Vec<OutboxRecord>,
    ) -> Result<Procurement> {
        let mut inner = self.inner.write().await;
        let saved = checked_upsert(&mut inner.procurements, procurement)?;
        inner.outbox.extend(outbox);
        Ok(saved)
    }

    async fn get_procurement(&self, id: AggregateId) -> Result<Option<Procurement>> {
        Ok(self.inner.read().await.procurements.get(&id).cloned())
    }

    async fn list_procurements(&self, filter: &ProcurementFilter) -> Result<Vec<Procurement>> {
        let inner = self.inner.read().await;
        let mut procurements: Vec<Procurement> = inner
            .procurements
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        procurements.sort_by_key(|p| p.created_at());
        Ok(procurements)
    }

    async fn procurements_open_past_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Procurement>> {
        let inner = self.inner.read().await;
        let mut procurements: Vec<Procurement> = inner
            .procurements
            .values()
            .filter(|p| p.status() == ProcurementStatus::BiddingOpen && p.deadline() < now)
            .cloned()
            .collect();
        procurements.sort_by_key(|p| p.deadline());
        Ok(procurements)
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn append_outbox(&self, records: Vec<OutboxRecord>) -> Result<()> {
        self.inner.write().await.outbox.extend(records);
        Ok(())
    }

    async fn pending_outbox(&self, max_retries: u32, limit: usize) -> Result<Vec<OutboxRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .outbox
            .iter()
            .filter(|r| !r.processed && r.retry_count < max_retries)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: EventId, processed_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .outbox
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "OutboxRecord",
                id: id.to_string(),
            })?;
        record.mark_processed(processed_at);
        Ok(())
    }

    async fn mark_failed(&self, id: EventId, error: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .outbox
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "OutboxRecord",
                id: id.to_string(),
            })?;
        record.record_failure(error);
        Ok(())
    }

    async fn purge_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.outbox.len();
        inner
            .outbox
            .retain(|r| !r.processed || r.processed_at.is_none_or(|at| at >= cutoff));
        Ok(before - inner.outbox.len())
    }
}
