//! Event bus publisher trait and in-memory implementation.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::EventId;
use store::OutboxRecord;
use thiserror::Error;

/// A failed publish attempt.
#[derive(Debug, Clone, Error)]
#[error("publish to {topic} failed: {message}")]
pub struct PublishError {
    /// The topic that was targeted.
    pub topic: String,
    /// Broker-reported failure.
    pub message: String,
}

/// Capability to durably hand a serialized event to a broker topic.
///
/// One call is one attempt; the relay owns retries and timeouts.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one outbox record to the given topic.
    async fn publish(&self, topic: &str, record: &OutboxRecord) -> Result<(), PublishError>;
}

/// Maps an event type to its broker topic.
pub fn topic_for(event_type: &str) -> &'static str {
    match event_type {
        "OrderCreated" | "OrderConfirmed" | "OrderFailed" => "order-events",
        "ProcurementCreated" | "BidSubmitted" | "ProcurementAwarded" => "procurement-events",
        _ => "domain-events",
    }
}

/// A record the in-memory bus accepted, with the topic it landed on.
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub topic: String,
    pub record: OutboxRecord,
}

#[derive(Debug, Default)]
struct InMemoryBusState {
    published: Vec<PublishedEvent>,
    attempts: u64,
    fail_on_publish: bool,
    fail_event_ids: HashSet<EventId>,
}

/// In-memory event bus for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<InMemoryBusState>>,
}

impl InMemoryEventBus {
    /// Creates a new in-memory bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the bus to fail every publish attempt.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Configures the bus to fail attempts for one specific event.
    pub fn fail_event(&self, id: EventId) {
        self.state.write().unwrap().fail_event_ids.insert(id);
    }

    /// Returns all accepted events in publish order.
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns the number of accepted events.
    pub fn published_count(&self) -> usize {
        self.state.read().unwrap().published.len()
    }

    /// Returns the total number of publish attempts, including failures.
    pub fn attempt_count(&self) -> u64 {
        self.state.read().unwrap().attempts
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, topic: &str, record: &OutboxRecord) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap();
        state.attempts += 1;

        if state.fail_on_publish || state.fail_event_ids.contains(&record.id) {
            return Err(PublishError {
                topic: topic.to_string(),
                message: "broker unavailable".to_string(),
            });
        }

        state.published.push(PublishedEvent {
            topic: topic.to_string(),
            record: record.clone(),
        });
        Ok(())
    }
}
