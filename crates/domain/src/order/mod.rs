//! Order aggregate and related types.

mod aggregate;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use state::{OrderStatus, SagaStatus};
pub use value_objects::{CustomerId, OrderLine, ProductId};

use thiserror::Error;

use crate::money::MoneyError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order must contain at least one line.
    #[error("order must contain at least one line")]
    NoLines,

    /// Line quantity must be greater than zero.
    #[error("invalid quantity for product {product_id}: must be greater than 0")]
    InvalidQuantity { product_id: String },

    /// Unit prices must not be negative.
    #[error("invalid unit price for product {product_id}: must not be negative")]
    NegativePrice { product_id: String },

    /// Saga status does not allow the requested transition.
    #[error("invalid saga transition: cannot {action} from {status} status")]
    InvalidSagaTransition {
        status: SagaStatus,
        action: &'static str,
    },

    /// Money arithmetic failed (mixed currencies across lines).
    #[error(transparent)]
    Money(#[from] MoneyError),
}
