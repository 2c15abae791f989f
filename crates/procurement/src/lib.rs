//! Procurement bidding workflow.
//!
//! Thin application service over the `Procurement` aggregate: it loads the
//! aggregate, applies one operation, and saves it back with the domain
//! events the operation produced, all behind the store's optimistic version
//! check.

mod service;

pub use service::{CreateProcurement, ProcurementService, ServiceError, SubmitBid};
