//! Outbox record: a durably stored, to-be-published domain event.

use chrono::{DateTime, Utc};
use common::{AggregateId, EventId};
use domain::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A domain event recorded alongside the business mutation it documents.
///
/// Lifecycle: created unprocessed in the same transaction as the aggregate
/// save, marked processed by the relay on successful publication, or left in
/// place with an incremented retry count and the last error on failure.
/// Processed records are eventually purged; unprocessed records are never
/// deleted automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Record identity, shared with the event it carries.
    pub id: EventId,

    /// The aggregate whose mutation produced the event.
    pub aggregate_id: AggregateId,

    /// Event type name, used for topic routing.
    pub event_type: String,

    /// The serialized event.
    pub payload: String,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was published, if it has been.
    pub processed_at: Option<DateTime<Utc>>,

    /// True once the event reached the bus.
    pub processed: bool,

    /// Number of failed publish attempts.
    pub retry_count: u32,

    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
}

impl OutboxRecord {
    /// Creates an unprocessed record.
    pub fn new(
        id: EventId,
        aggregate_id: AggregateId,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id,
            aggregate_id,
            event_type: event_type.into(),
            payload: payload.into(),
            created_at: Utc::now(),
            processed_at: None,
            processed: false,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Serializes a domain event into an unprocessed record.
    pub fn for_event(event: &DomainEvent) -> Result<Self> {
        let payload = serde_json::to_string(event)?;
        Ok(Self::new(
            event.event_id,
            event.aggregate_id,
            event.event_type(),
            payload,
        ))
    }

    /// Marks the record as published.
    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.processed = true;
        self.processed_at = Some(now);
    }

    /// Records a failed publish attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_error = Some(error.into());
    }
}
