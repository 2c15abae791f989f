//! Remote step client traits and in-memory implementations.

mod inventory;
mod payment;

pub use inventory::{InMemoryInventoryClient, InventoryClient, Reservation, ReservationItem};
pub use payment::{InMemoryPaymentClient, Payment, PaymentClient};

use thiserror::Error;

/// Errors a remote capability can return for one attempt.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The service answered and said no. Not retried.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The service could not be reached or did not answer usefully.
    /// Retried up to the step policy's attempt budget.
    #[error("unavailable: {0}")]
    Unavailable(String),
}
