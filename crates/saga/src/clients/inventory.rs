//! Inventory service client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::ProductId;

use super::ClientError;

/// Result of a successful inventory reservation.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// The reservation ID assigned by the inventory service.
    pub reservation_id: String,
}

/// An item to reserve in inventory.
#[derive(Debug, Clone)]
pub struct ReservationItem {
    /// The product to reserve.
    pub product_id: ProductId,
    /// Quantity to reserve.
    pub quantity: u32,
}

/// Capability interface of the inventory service.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Reserves inventory for the given order items.
    async fn reserve(
        &self,
        order_id: AggregateId,
        items: Vec<ReservationItem>,
    ) -> Result<Reservation, ClientError>;

    /// Releases a previously made reservation.
    ///
    /// Idempotent by reservation ID: releasing an unknown or already
    /// released reservation acknowledges without error, so a compensation
    /// racing a slow reserve call stays harmless.
    async fn release(&self, reservation_id: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    reservations: HashMap<String, (AggregateId, Vec<ReservationItem>)>,
    next_id: u32,
    fail_on_reserve: bool,
    transient_reserve_failures: u32,
    fail_on_release: bool,
    reserve_calls: u32,
    release_calls: u32,
}

/// In-memory inventory client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryClient {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryClient {
    /// Creates a new in-memory inventory client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the client to reject every reserve call.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().unwrap().fail_on_reserve = fail;
    }

    /// Makes the next `count` reserve calls fail as unavailable, then recover.
    pub fn fail_reserve_transiently(&self, count: u32) {
        self.state.write().unwrap().transient_reserve_failures = count;
    }

    /// Configures the client to fail release calls.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.state.write().unwrap().fail_on_release = fail;
    }

    /// Returns the number of active reservations.
    pub fn reservation_count(&self) -> usize {
        self.state.read().unwrap().reservations.len()
    }

    /// Returns true if a reservation exists with the given ID.
    pub fn has_reservation(&self, reservation_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .reservations
            .contains_key(reservation_id)
    }

    /// Returns the number of reserve attempts received.
    pub fn reserve_call_count(&self) -> u32 {
        self.state.read().unwrap().reserve_calls
    }

    /// Returns the number of release attempts received.
    pub fn release_call_count(&self) -> u32 {
        self.state.read().unwrap().release_calls
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryClient {
    async fn reserve(
        &self,
        order_id: AggregateId,
        items: Vec<ReservationItem>,
    ) -> Result<Reservation, ClientError> {
        let mut state = self.state.write().unwrap();
        state.reserve_calls += 1;

        if state.transient_reserve_failures > 0 {
            state.transient_reserve_failures -= 1;
            return Err(ClientError::Unavailable(
                "inventory service timed out".to_string(),
            ));
        }

        if state.fail_on_reserve {
            return Err(ClientError::Rejected("insufficient stock".to_string()));
        }

        state.next_id += 1;
        let reservation_id = format!("RES-{:04}", state.next_id);
        state
            .reservations
            .insert(reservation_id.clone(), (order_id, items));

        Ok(Reservation { reservation_id })
    }

    async fn release(&self, reservation_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.write().unwrap();
        state.release_calls += 1;

        if state.fail_on_release {
            return Err(ClientError::Unavailable(
                "inventory service unreachable".to_string(),
            ));
        }

        state.reservations.remove(reservation_id);
        Ok(())
    }
}
