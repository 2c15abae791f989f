//! Domain layer for the agri-procurement core.
//!
//! This crate provides the business model shared by the saga orchestrator,
//! the outbox relay, and the procurement service:
//! - `Money` and `Quantity` value objects with currency/unit safety
//! - The `Order` aggregate and its saga state machine
//! - The `Procurement` aggregate with its bidding state machine
//! - Domain events recorded through the transactional outbox

pub mod aggregate;
pub mod events;
pub mod money;
pub mod order;
pub mod procurement;
pub mod quantity;

pub use aggregate::AggregateRoot;
pub use events::{DomainEvent, EventPayload};
pub use money::{Currency, Money, MoneyError};
pub use order::{
    CustomerId, Order, OrderError, OrderLine, OrderStatus, ProductId, SagaStatus,
};
pub use procurement::{
    Bid, BidId, BidStatus, BuyerId, Procurement, ProcurementError, ProcurementStatus, VendorId,
};
pub use quantity::{Quantity, QuantityError, Unit};
