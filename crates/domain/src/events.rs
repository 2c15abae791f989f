//! Domain events recorded through the transactional outbox.
//!
//! Events are facts other services must eventually observe. They are never
//! published directly: the mutation that produced them writes them to the
//! outbox in the same local transaction, and the relay forwards them to the
//! bus afterwards.

use chrono::{DateTime, Utc};
use common::{AggregateId, EventId};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRoot;
use crate::money::Money;
use crate::order::{CustomerId, Order};
use crate::procurement::{Bid, BidId, Procurement, VendorId};
use crate::quantity::Quantity;

/// A domain event with its envelope metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The aggregate this event belongs to.
    pub aggregate_id: AggregateId,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// The event payload, tagged with the event type.
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Payloads of the events the core emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum EventPayload {
    /// An order entered the saga.
    OrderCreated(OrderCreatedData),

    /// An order saga completed and the order is confirmed.
    OrderConfirmed(OrderConfirmedData),

    /// An order saga failed and compensation has been attempted.
    OrderFailed(OrderFailedData),

    /// A procurement was created.
    ProcurementCreated(ProcurementCreatedData),

    /// A vendor submitted a bid.
    BidSubmitted(BidSubmittedData),

    /// A procurement was awarded to a bid.
    ProcurementAwarded(ProcurementAwardedData),
}

impl EventPayload {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::OrderCreated(_) => "OrderCreated",
            EventPayload::OrderConfirmed(_) => "OrderConfirmed",
            EventPayload::OrderFailed(_) => "OrderFailed",
            EventPayload::ProcurementCreated(_) => "ProcurementCreated",
            EventPayload::BidSubmitted(_) => "BidSubmitted",
            EventPayload::ProcurementAwarded(_) => "ProcurementAwarded",
        }
    }
}

/// Data for the OrderCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub line_count: usize,
}

/// Data for the OrderConfirmed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmedData {
    pub order_id: AggregateId,
    pub reservation_id: Option<String>,
    pub payment_id: Option<String>,
}

/// Data for the OrderFailed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFailedData {
    pub order_id: AggregateId,
    pub reason: String,
}

/// Data for the ProcurementCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcurementCreatedData {
    pub procurement_id: AggregateId,
    pub title: String,
    pub quantity: Quantity,
    pub budget: Money,
    pub deadline: DateTime<Utc>,
}

/// Data for the BidSubmitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidSubmittedData {
    pub procurement_id: AggregateId,
    pub bid_id: BidId,
    pub vendor_id: VendorId,
    pub amount: Money,
    pub submitted_at: DateTime<Utc>,
}

/// Data for the ProcurementAwarded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcurementAwardedData {
    pub procurement_id: AggregateId,
    pub bid_id: BidId,
    pub vendor_id: VendorId,
}

// Convenience constructors
impl DomainEvent {
    fn envelope(aggregate_id: AggregateId, payload: EventPayload) -> Self {
        Self {
            event_id: EventId::new(),
            aggregate_id,
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Creates an OrderCreated event from an order.
    pub fn order_created(order: &Order) -> Self {
        Self::envelope(
            order.id(),
            EventPayload::OrderCreated(OrderCreatedData {
                order_id: order.id(),
                customer_id: order.customer_id(),
                total_amount: order.total_amount(),
                line_count: order.lines().len(),
            }),
        )
    }

    /// Creates an OrderConfirmed event from a completed order.
    pub fn order_confirmed(order: &Order) -> Self {
        Self::envelope(
            order.id(),
            EventPayload::OrderConfirmed(OrderConfirmedData {
                order_id: order.id(),
                reservation_id: order.reservation_id().map(String::from),
                payment_id: order.payment_id().map(String::from),
            }),
        )
    }

    /// Creates an OrderFailed event from a compensated order.
    pub fn order_failed(order: &Order, reason: impl Into<String>) -> Self {
        Self::envelope(
            order.id(),
            EventPayload::OrderFailed(OrderFailedData {
                order_id: order.id(),
                reason: reason.into(),
            }),
        )
    }

    /// Creates a ProcurementCreated event from a procurement.
    pub fn procurement_created(procurement: &Procurement) -> Self {
        Self::envelope(
            procurement.id(),
            EventPayload::ProcurementCreated(ProcurementCreatedData {
                procurement_id: procurement.id(),
                title: procurement.title().to_string(),
                quantity: procurement.quantity(),
                budget: procurement.budget(),
                deadline: procurement.deadline(),
            }),
        )
    }

    /// Creates a BidSubmitted event from a procurement and one of its bids.
    pub fn bid_submitted(procurement: &Procurement, bid: &Bid) -> Self {
        Self::envelope(
            procurement.id(),
            EventPayload::BidSubmitted(BidSubmittedData {
                procurement_id: procurement.id(),
                bid_id: bid.id(),
                vendor_id: bid.vendor_id().clone(),
                amount: bid.amount(),
                submitted_at: bid.submitted_at(),
            }),
        )
    }

    /// Creates a ProcurementAwarded event from an awarded procurement.
    pub fn procurement_awarded(procurement: &Procurement, bid: &Bid) -> Self {
        Self::envelope(
            procurement.id(),
            EventPayload::ProcurementAwarded(ProcurementAwardedData {
                procurement_id: procurement.id(),
                bid_id: bid.id(),
                vendor_id: bid.vendor_id().clone(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::order::OrderLine;
    use crate::procurement::BuyerId;
    use crate::quantity::Unit;
    use chrono::Duration;

    fn order() -> Order {
        Order::new(
            CustomerId::new(),
            vec![OrderLine::new(
                "SKU-001",
                2,
                Money::from_minor(1000, Currency::Usd),
            )],
        )
        .unwrap()
    }

    #[test]
    fn test_event_types() {
        let order = order();
        assert_eq!(DomainEvent::order_created(&order).event_type(), "OrderCreated");
        assert_eq!(
            DomainEvent::order_confirmed(&order).event_type(),
            "OrderConfirmed"
        );
        assert_eq!(
            DomainEvent::order_failed(&order, "declined").event_type(),
            "OrderFailed"
        );
    }

    #[test]
    fn test_order_created_carries_totals() {
        let order = order();
        let event = DomainEvent::order_created(&order);
        assert_eq!(event.aggregate_id, order.id());
        if let EventPayload::OrderCreated(data) = &event.payload {
            assert_eq!(data.total_amount.minor(), 2000);
            assert_eq!(data.line_count, 1);
        } else {
            panic!("expected OrderCreated payload");
        }
    }

    #[test]
    fn test_serialization_tags_event_type() {
        let order = order();
        let event = DomainEvent::order_created(&order);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"OrderCreated\""));

        let deserialized: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.event_type(), "OrderCreated");
        assert_eq!(deserialized.event_id, event.event_id);
    }

    #[test]
    fn test_bid_submitted_event() {
        let now = Utc::now();
        let mut p = Procurement::new(
            "Seed Procurement",
            "Certified seeds",
            Quantity::new(100, Unit::Kilogram).unwrap(),
            Money::from_minor(1_000_000, Currency::Usd),
            now + Duration::days(30),
            BuyerId::new("buyer-1"),
        )
        .unwrap();
        p.publish(now).unwrap();
        p.open_bidding().unwrap();
        let bid = p
            .add_bid(
                "vendor-1".into(),
                Money::from_minor(900_000, Currency::Usd),
                None,
                now,
            )
            .unwrap()
            .clone();

        let event = DomainEvent::bid_submitted(&p, &bid);
        assert_eq!(event.event_type(), "BidSubmitted");
        assert_eq!(event.aggregate_id, p.id());

        let json = serde_json::to_string(&event).unwrap();
        let roundtrip: DomainEvent = serde_json::from_str(&json).unwrap();
        if let EventPayload::BidSubmitted(data) = roundtrip.payload {
            assert_eq!(data.bid_id, bid.id());
            assert_eq!(data.vendor_id.as_str(), "vendor-1");
        } else {
            panic!("expected BidSubmitted payload");
        }
    }
}
