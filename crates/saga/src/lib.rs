//! Order saga orchestration.
//!
//! Drives an order through reserve inventory → process payment → confirm,
//! synchronously within the request that created it. On a step failure the
//! completed steps are undone in reverse order (refund, then release) and
//! the order finishes as `Failed` with the triggering error recorded.
//!
//! Remote-step calls are wrapped in composable retry/circuit-breaker/timeout
//! policies expressed as plain data. A periodic recovery sweep compensates
//! sagas left stuck by a crash between steps.

pub mod clients;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod resilience;

pub use clients::{
    ClientError, InMemoryInventoryClient, InMemoryPaymentClient, InventoryClient, Payment,
    PaymentClient, Reservation, ReservationItem,
};
pub use error::SagaError;
pub use orchestrator::{OrderSagaOrchestrator, SagaConfig};
pub use recovery::RecoverySummary;
pub use resilience::{BreakerPolicy, CircuitBreaker, StepError, StepPolicy, call_with_policy};
