//! Saga error types.

use domain::OrderError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the saga orchestrator.
///
/// Remote-step failures are deliberately absent: they are caught inside the
/// orchestrator and converted into a completed-but-failed order instead of
/// being propagated.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Order validation failed or an illegal transition was attempted.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// The store rejected an operation. Stale-version conflicts arrive here
    /// and fail the whole call; the caller should re-fetch and retry.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SagaError {
    /// Returns true if the error is a stale-version conflict the caller can
    /// retry by re-issuing the whole operation.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            SagaError::Store(StoreError::ConcurrencyConflict { .. })
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
