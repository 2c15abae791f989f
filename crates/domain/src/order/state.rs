//! Order and saga status state machines.

use serde::{Deserialize, Serialize};

/// The externally visible status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order is being driven through the saga.
    #[default]
    Pending,

    /// The saga completed: inventory reserved and payment captured.
    Confirmed,

    /// Order was cancelled before any remote side effect occurred.
    Cancelled,

    /// The saga failed and compensation has been attempted.
    Failed,
}

impl OrderStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of the order saga.
///
/// Transitions are monotonic forward, except for the compensation branch:
/// ```text
/// Started ──► InventoryReserved ──► PaymentProcessed ──► Completed
///    │               │                     │
///    └───────────────┴─────────────────────┴──► Compensating ──► Compensated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Saga has started; no remote step has completed yet.
    #[default]
    Started,

    /// Inventory has been reserved; the reservation ID is persisted.
    InventoryReserved,

    /// Payment has been captured; the payment ID is persisted.
    PaymentProcessed,

    /// All steps completed (terminal state).
    Completed,

    /// A step failed; completed steps are being undone in reverse order.
    Compensating,

    /// Compensation has been attempted (terminal state).
    Compensated,
}

impl SagaStatus {
    /// Returns true if the inventory reservation step may complete now.
    pub fn can_reserve(&self) -> bool {
        matches!(self, SagaStatus::Started)
    }

    /// Returns true if the payment step may complete now.
    pub fn can_process_payment(&self) -> bool {
        matches!(self, SagaStatus::InventoryReserved)
    }

    /// Returns true if the saga may complete now.
    pub fn can_complete(&self) -> bool {
        matches!(self, SagaStatus::PaymentProcessed)
    }

    /// Returns true if compensation may start from this status.
    pub fn can_compensate(&self) -> bool {
        matches!(
            self,
            SagaStatus::Started | SagaStatus::InventoryReserved | SagaStatus::PaymentProcessed
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Compensated)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "Started",
            SagaStatus::InventoryReserved => "InventoryReserved",
            SagaStatus::PaymentProcessed => "PaymentProcessed",
            SagaStatus::Completed => "Completed",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_statuses() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(SagaStatus::default(), SagaStatus::Started);
    }

    #[test]
    fn test_can_reserve_only_from_started() {
        assert!(SagaStatus::Started.can_reserve());
        assert!(!SagaStatus::InventoryReserved.can_reserve());
        assert!(!SagaStatus::PaymentProcessed.can_reserve());
        assert!(!SagaStatus::Completed.can_reserve());
        assert!(!SagaStatus::Compensating.can_reserve());
        assert!(!SagaStatus::Compensated.can_reserve());
    }

    #[test]
    fn test_can_process_payment_only_after_reservation() {
        assert!(!SagaStatus::Started.can_process_payment());
        assert!(SagaStatus::InventoryReserved.can_process_payment());
        assert!(!SagaStatus::PaymentProcessed.can_process_payment());
    }

    #[test]
    fn test_can_complete_only_after_payment() {
        assert!(!SagaStatus::InventoryReserved.can_complete());
        assert!(SagaStatus::PaymentProcessed.can_complete());
        assert!(!SagaStatus::Completed.can_complete());
    }

    #[test]
    fn test_can_compensate_from_any_in_flight_status() {
        assert!(SagaStatus::Started.can_compensate());
        assert!(SagaStatus::InventoryReserved.can_compensate());
        assert!(SagaStatus::PaymentProcessed.can_compensate());
        assert!(!SagaStatus::Completed.can_compensate());
        assert!(!SagaStatus::Compensating.can_compensate());
        assert!(!SagaStatus::Compensated.can_compensate());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(!SagaStatus::Started.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderStatus::Confirmed.to_string(), "Confirmed");
        assert_eq!(SagaStatus::InventoryReserved.to_string(), "InventoryReserved");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let json = serde_json::to_string(&SagaStatus::Compensating).unwrap();
        let deserialized: SagaStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, SagaStatus::Compensating);
    }
}
