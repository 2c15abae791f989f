//! HTTP API surface for the agri-procurement core.
//!
//! Exposes the order saga and the procurement bidding workflow over REST,
//! with structured logging (tracing) and Prometheus metrics. The binary in
//! `main.rs` also wires the periodic tasks: outbox relay tick and cleanup,
//! stalled-saga recovery, and the expired-bidding sweep.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use outbox::{InMemoryEventBus, OutboxRelay, RelayConfig};
use procurement::ProcurementService;
use saga::{InMemoryInventoryClient, InMemoryPaymentClient, OrderSagaOrchestrator, SagaConfig};
use store::InMemoryStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppCore, AppState};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: AppCore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/procurements", post(routes::procurements::create::<S>))
        .route("/procurements", get(routes::procurements::list::<S>))
        .route("/procurements/{id}", get(routes::procurements::get::<S>))
        .route(
            "/procurements/{id}/publish",
            post(routes::procurements::publish::<S>),
        )
        .route(
            "/procurements/{id}/bids",
            post(routes::procurements::submit_bid::<S>),
        )
        .route(
            "/procurements/{id}/close-bidding",
            post(routes::procurements::close_bidding::<S>),
        )
        .route(
            "/procurements/{id}/award",
            post(routes::procurements::award::<S>),
        )
        .route(
            "/procurements/{id}/cancel",
            post(routes::procurements::cancel::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state on the in-memory store, with
/// in-memory remote clients and event bus.
pub fn create_default_state(
    store: InMemoryStore,
) -> (
    Arc<AppState<InMemoryStore>>,
    Arc<OutboxRelay<InMemoryStore, InMemoryEventBus>>,
    InMemoryEventBus,
) {
    let inventory = InMemoryInventoryClient::new();
    let payment = InMemoryPaymentClient::new();
    let bus = InMemoryEventBus::new();

    let orchestrator = Arc::new(OrderSagaOrchestrator::new(
        store.clone(),
        inventory,
        payment,
        SagaConfig::default(),
    ));
    let procurements = Arc::new(ProcurementService::new(store.clone()));
    let relay = Arc::new(OutboxRelay::new(
        store.clone(),
        bus.clone(),
        RelayConfig::default(),
    ));

    let state = Arc::new(AppState {
        orchestrator,
        procurements,
        store,
    });

    (state, relay, bus)
}
