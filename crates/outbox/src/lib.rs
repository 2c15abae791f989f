//! Transactional outbox relay.
//!
//! Recording that an event occurred and notifying the bus are decoupled:
//! the record is committed atomically with the business mutation (see the
//! `store` crate), and this crate's relay forwards unprocessed records to
//! the bus on a fixed interval. Broker downtime is tolerated indefinitely,
//! bounded by a max-retry policy after which a record is left unprocessed
//! for operational inspection, never silently dropped.

pub mod publisher;
pub mod relay;

pub use publisher::{EventPublisher, InMemoryEventBus, PublishError, PublishedEvent, topic_for};
pub use relay::{OutboxRelay, RelayConfig, RelayError, RelayTickSummary};
