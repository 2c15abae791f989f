//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRoot;
use crate::money::Money;

use super::{CustomerId, OrderError, OrderLine, OrderStatus, SagaStatus};

/// Order aggregate root.
///
/// Carries both the externally visible order status and the saga progress.
/// Remote-step identifiers (reservation, payment) are persisted as soon as
/// the step succeeds so compensation always knows what to undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: AggregateId,
    customer_id: CustomerId,
    lines: Vec<OrderLine>,
    total_amount: Money,
    status: OrderStatus,
    saga_status: SagaStatus,
    failure_reason: Option<String>,
    reservation_id: Option<String>,
    payment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: Version,
}

impl AggregateRoot for Order {
    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

impl Order {
    /// Creates a new order in `Pending`/`Started` state.
    ///
    /// Validates that the order has at least one line, every line has a
    /// positive quantity and a non-negative unit price, and all lines share
    /// one currency. The total amount is derived as the sum of line totals.
    pub fn new(customer_id: CustomerId, lines: Vec<OrderLine>) -> Result<Self, OrderError> {
        if lines.is_empty() {
            return Err(OrderError::NoLines);
        }

        for line in &lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id.to_string(),
                });
            }
            if line.unit_price.is_negative() {
                return Err(OrderError::NegativePrice {
                    product_id: line.product_id.to_string(),
                });
            }
        }

        let mut total = Money::zero(lines[0].unit_price.currency());
        for line in &lines {
            total = total.add(line.line_total)?;
        }

        let now = Utc::now();
        Ok(Self {
            id: AggregateId::new(),
            customer_id,
            lines,
            total_amount: total,
            status: OrderStatus::Pending,
            saga_status: SagaStatus::Started,
            failure_reason: None,
            reservation_id: None,
            payment_id: None,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        })
    }

    /// Records a successful inventory reservation.
    pub fn mark_inventory_reserved(
        &mut self,
        reservation_id: impl Into<String>,
    ) -> Result<(), OrderError> {
        if !self.saga_status.can_reserve() {
            return Err(OrderError::InvalidSagaTransition {
                status: self.saga_status,
                action: "mark inventory reserved",
            });
        }
        self.saga_status = SagaStatus::InventoryReserved;
        self.reservation_id = Some(reservation_id.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a successful payment capture.
    pub fn mark_payment_processed(
        &mut self,
        payment_id: impl Into<String>,
    ) -> Result<(), OrderError> {
        if !self.saga_status.can_process_payment() {
            return Err(OrderError::InvalidSagaTransition {
                status: self.saga_status,
                action: "mark payment processed",
            });
        }
        self.saga_status = SagaStatus::PaymentProcessed;
        self.payment_id = Some(payment_id.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Confirms the order.
    ///
    /// `Confirmed` only ever appears together with `SagaStatus::Completed`.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if !self.saga_status.can_complete() {
            return Err(OrderError::InvalidSagaTransition {
                status: self.saga_status,
                action: "confirm",
            });
        }
        self.saga_status = SagaStatus::Completed;
        self.status = OrderStatus::Confirmed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Enters the compensation branch after a step failure.
    pub fn begin_compensation(&mut self) -> Result<(), OrderError> {
        if !self.saga_status.can_compensate() {
            return Err(OrderError::InvalidSagaTransition {
                status: self.saga_status,
                action: "begin compensation",
            });
        }
        self.saga_status = SagaStatus::Compensating;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Finishes compensation and marks the order failed.
    ///
    /// The triggering error is recorded verbatim as the failure reason.
    pub fn mark_compensated(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        if self.saga_status != SagaStatus::Compensating {
            return Err(OrderError::InvalidSagaTransition {
                status: self.saga_status,
                action: "mark compensated",
            });
        }
        self.saga_status = SagaStatus::Compensated;
        self.status = OrderStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Cancels an order that never advanced past `Started`.
    ///
    /// No remote side effect exists yet, so there is nothing to unwind.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.saga_status != SagaStatus::Started {
            return Err(OrderError::InvalidSagaTransition {
                status: self.saga_status,
                action: "cancel",
            });
        }
        self.saga_status = SagaStatus::Compensated;
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }
}

// Query methods
impl Order {
    /// Returns the customer ID.
    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Returns the order lines in insertion order.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the total amount, equal to the sum of line totals.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the order status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the saga status.
    pub fn saga_status(&self) -> SagaStatus {
        self.saga_status
    }

    /// Returns the failure reason, set only when the order is `Failed`.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns the inventory reservation ID, if the step completed.
    pub fn reservation_id(&self) -> Option<&str> {
        self.reservation_id.as_deref()
    }

    /// Returns the payment ID, if the step completed.
    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    /// Returns when the order was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the order was last mutated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
