//! Shared application state.

use std::sync::Arc;

use procurement::ProcurementService;
use saga::{InMemoryInventoryClient, InMemoryPaymentClient, OrderSagaOrchestrator};
use store::{OrderStore, OutboxStore, ProcurementStore};

/// Store capabilities the application state requires.
pub trait AppCore:
    OrderStore + ProcurementStore + OutboxStore + Clone + Send + Sync + 'static
{
}

impl<T> AppCore for T where
    T: OrderStore + ProcurementStore + OutboxStore + Clone + Send + Sync + 'static
{
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: AppCore> {
    pub orchestrator:
        Arc<OrderSagaOrchestrator<S, InMemoryInventoryClient, InMemoryPaymentClient>>,
    pub procurements: Arc<ProcurementService<S>>,
    pub store: S,
}
