//! Outbox relay: forwards unprocessed records to the bus with retries,
//! and purges processed records after a retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::DomainEvent;
use store::{OutboxStore, StoreError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::publisher::{EventPublisher, topic_for};

/// Relay policy, passed as plain data.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Records with this many failed attempts are left for operator inspection.
    pub max_retries: u32,

    /// Maximum records handled per tick.
    pub batch_size: usize,

    /// Bounded wait per publish attempt.
    pub publish_timeout: Duration,

    /// Interval between relay ticks.
    pub tick_interval: Duration,

    /// Interval between retention cleanups.
    pub cleanup_interval: Duration,

    /// How long processed records are kept before cleanup deletes them.
    pub retention: chrono::Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            batch_size: 100,
            publish_timeout: Duration::from_secs(10),
            tick_interval: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(3600),
            retention: chrono::Duration::days(7),
        }
    }
}

/// Errors that stop a whole relay pass (individual publish failures do not).
#[derive(Debug, Error)]
pub enum RelayError {
    /// The store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of one relay tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayTickSummary {
    /// Records selected for this tick.
    pub fetched: usize,
    /// Records published and marked processed.
    pub published: usize,
    /// Records whose attempt failed and whose retry count was incremented.
    pub failed: usize,
}

/// Polls the store for unprocessed records and forwards them to the bus.
///
/// Within one aggregate, records relay in creation order: selection is
/// oldest-first and a failed record stays retryable in place rather than
/// being reordered. Each record's attempt is independent; one failure never
/// blocks the rest of the batch.
pub struct OutboxRelay<S, P> {
    store: S,
    publisher: P,
    config: RelayConfig,
}

impl<S, P> OutboxRelay<S, P>
where
    S: OutboxStore,
    P: EventPublisher,
{
    /// Creates a new relay.
    pub fn new(store: S, publisher: P, config: RelayConfig) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Returns the relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Runs one relay pass over the pending batch.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<RelayTickSummary, RelayError> {
        let pending = self
            .store
            .pending_outbox(self.config.max_retries, self.config.batch_size)
            .await?;

        let mut summary = RelayTickSummary {
            fetched: pending.len(),
            ..Default::default()
        };

        for record in pending {
            match self.attempt_publish(&record).await {
                Ok(()) => {
                    self.store.mark_processed(record.id, Utc::now()).await?;
                    summary.published += 1;
                    metrics::counter!("outbox_records_published").increment(1);
                    tracing::debug!(
                        event_id = %record.id,
                        event_type = %record.event_type,
                        "outbox record published"
                    );
                }
                Err(error) => {
                    self.store.mark_failed(record.id, &error).await?;
                    summary.failed += 1;
                    metrics::counter!("outbox_records_failed").increment(1);
                    tracing::error!(
                        event_id = %record.id,
                        event_type = %record.event_type,
                        attempt = record.retry_count + 1,
                        %error,
                        "outbox record publish failed"
                    );
                }
            }
        }

        Ok(summary)
    }

    /// Deletes processed records older than the retention window.
    ///
    /// Unprocessed records are never deleted, regardless of age; operator
    /// intervention is the escape valve for permanently stuck events.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self) -> Result<usize, RelayError> {
        let cutoff = Utc::now() - self.config.retention;
        let purged = self.store.purge_processed_before(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, "purged processed outbox records");
        }
        Ok(purged)
    }

    async fn attempt_publish(&self, record: &store::OutboxRecord) -> Result<(), String> {
        // A payload that cannot be decoded can never publish; the failure is
        // recorded on the record until its retries are exhausted, leaving it
        // visible for operators.
        let _event: DomainEvent = serde_json::from_str(&record.payload)
            .map_err(|e| format!("undecodable payload: {e}"))?;

        let topic = topic_for(&record.event_type);
        match tokio::time::timeout(
            self.config.publish_timeout,
            self.publisher.publish(topic, record),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "publish to {topic} timed out after {:?}",
                self.config.publish_timeout
            )),
        }
    }
}

impl<S, P> OutboxRelay<S, P>
where
    S: OutboxStore + 'static,
    P: EventPublisher + 'static,
{
    /// Spawns the periodic tick and cleanup loops.
    ///
    /// Returns the task handles; aborting them stops the relay.
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let tick_relay = Arc::clone(&self);
        let tick_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_relay.config.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(error) = tick_relay.tick().await {
                    tracing::error!(%error, "outbox relay tick failed");
                }
            }
        });

        let cleanup_relay = self;
        let cleanup_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_relay.config.cleanup_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(error) = cleanup_relay.cleanup().await {
                    tracing::error!(%error, "outbox cleanup failed");
                }
            }
        });

        (tick_handle, cleanup_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::InMemoryEventBus;
    use common::{AggregateId, EventId};
    use domain::{Currency, CustomerId, Money, Order, OrderLine};
    use store::{InMemoryStore, OutboxRecord};

    fn relay(
        store: InMemoryStore,
        bus: InMemoryEventBus,
    ) -> OutboxRelay<InMemoryStore, InMemoryEventBus> {
        OutboxRelay::new(store, bus, RelayConfig::default())
    }

    fn event_record() -> OutboxRecord {
        let order = Order::new(
            CustomerId::new(),
            vec![OrderLine::new(
                "SKU-001",
                1,
                Money::from_minor(100, Currency::Usd),
            )],
        )
        .unwrap();
        OutboxRecord::for_event(&DomainEvent::order_created(&order)).unwrap()
    }

    #[tokio::test]
    async fn tick_publishes_pending_records() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        let records = vec![event_record(), event_record()];
        store.append_outbox(records).await.unwrap();

        let relay = relay(store.clone(), bus.clone());
        let summary = relay.tick().await.unwrap();

        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.published, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(bus.published_count(), 2);
        assert!(store.outbox_records().await.iter().all(|r| r.processed));
    }

    #[tokio::test]
    async fn tick_routes_to_topic_by_event_type() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        store.append_outbox(vec![event_record()]).await.unwrap();

        relay(store, bus.clone()).tick().await.unwrap();
        assert_eq!(bus.published()[0].topic, "order-events");
    }

    #[tokio::test]
    async fn failed_publish_increments_retry_and_stays() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        bus.set_fail_on_publish(true);
        store.append_outbox(vec![event_record()]).await.unwrap();

        let relay = relay(store.clone(), bus.clone());
        let summary = relay.tick().await.unwrap();
        assert_eq!(summary.failed, 1);

        let records = store.outbox_records().await;
        assert!(!records[0].processed);
        assert_eq!(records[0].retry_count, 1);
        assert!(records[0].last_error.is_some());

        // Broker recovers; the record goes out on the next tick.
        bus.set_fail_on_publish(false);
        let summary = relay.tick().await.unwrap();
        assert_eq!(summary.published, 1);
        assert!(store.outbox_records().await[0].processed);
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_batch() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        let poisoned = event_record();
        let healthy = event_record();
        bus.fail_event(poisoned.id);
        store
            .append_outbox(vec![poisoned.clone(), healthy.clone()])
            .await
            .unwrap();

        let summary = relay(store.clone(), bus.clone()).tick().await.unwrap();

        assert_eq!(summary.published, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(bus.published()[0].record.id, healthy.id);
    }

    #[tokio::test]
    async fn exhausted_records_leave_relay_consideration_but_are_kept() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        bus.set_fail_on_publish(true);
        store.append_outbox(vec![event_record()]).await.unwrap();

        let relay = relay(store.clone(), bus.clone());
        for _ in 0..3 {
            relay.tick().await.unwrap();
        }

        // Retries exhausted: no further attempts are made.
        let summary = relay.tick().await.unwrap();
        assert_eq!(summary.fetched, 0);
        assert_eq!(bus.attempt_count(), 3);

        // Never silently dropped: the record remains with its last error.
        let records = store.outbox_records().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].processed);
        assert_eq!(records[0].retry_count, 3);
        assert!(records[0].last_error.is_some());
    }

    #[tokio::test]
    async fn undecodable_payload_is_recorded_not_published() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        store
            .append_outbox(vec![OutboxRecord::new(
                EventId::new(),
                AggregateId::new(),
                "OrderCreated",
                "not json",
            )])
            .await
            .unwrap();

        let summary = relay(store.clone(), bus.clone()).tick().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(bus.attempt_count(), 0);
        let records = store.outbox_records().await;
        assert!(records[0].last_error.as_deref().unwrap().contains("undecodable"));
    }

    #[tokio::test]
    async fn relay_preserves_creation_order_per_aggregate() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        let records: Vec<OutboxRecord> = (0..4).map(|_| event_record()).collect();
        let ids: Vec<EventId> = records.iter().map(|r| r.id).collect();
        store.append_outbox(records).await.unwrap();

        relay(store, bus.clone()).tick().await.unwrap();

        let published_ids: Vec<EventId> = bus.published().iter().map(|p| p.record.id).collect();
        assert_eq!(published_ids, ids);
    }

    #[tokio::test]
    async fn cleanup_purges_only_old_processed_records() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        let old = event_record();
        let unprocessed = event_record();
        store
            .append_outbox(vec![old.clone(), unprocessed.clone()])
            .await
            .unwrap();
        store
            .mark_processed(old.id, Utc::now() - chrono::Duration::days(10))
            .await
            .unwrap();

        let purged = relay(store.clone(), bus).cleanup().await.unwrap();

        assert_eq!(purged, 1);
        let remaining = store.outbox_records().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, unprocessed.id);
    }

    #[tokio::test]
    async fn batch_size_bounds_a_tick() {
        let store = InMemoryStore::new();
        let bus = InMemoryEventBus::new();
        let records: Vec<OutboxRecord> = (0..5).map(|_| event_record()).collect();
        store.append_outbox(records).await.unwrap();

        let relay = OutboxRelay::new(
            store,
            bus,
            RelayConfig {
                batch_size: 2,
                ..RelayConfig::default()
            },
        );

        let summary = relay.tick().await.unwrap();
        assert_eq!(summary.fetched, 2);

        let summary = relay.tick().await.unwrap();
        assert_eq!(summary.fetched, 2);

        let summary = relay.tick().await.unwrap();
        assert_eq!(summary.fetched, 1);
    }
}
