//! Payment service client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;
use domain::{CustomerId, Money};

use super::ClientError;

/// Result of a successful payment capture.
#[derive(Debug, Clone)]
pub struct Payment {
    /// The payment ID assigned by the payment service.
    pub payment_id: String,
}

/// Capability interface of the payment service.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Charges a customer for an order.
    async fn charge(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        amount: Money,
    ) -> Result<Payment, ClientError>;

    /// Refunds a previously captured payment.
    ///
    /// Idempotent by payment ID: refunding an unknown or already refunded
    /// payment acknowledges without error.
    async fn refund(&self, payment_id: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, (AggregateId, CustomerId, Money)>,
    next_id: u32,
    fail_on_charge: bool,
    transient_charge_failures: u32,
    fail_on_refund: bool,
    charge_calls: u32,
    refund_calls: u32,
}

/// In-memory payment client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentClient {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentClient {
    /// Creates a new in-memory payment client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the client to decline every charge call.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Makes the next `count` charge calls fail as unavailable, then recover.
    pub fn fail_charge_transiently(&self, count: u32) {
        self.state.write().unwrap().transient_charge_failures = count;
    }

    /// Configures the client to fail refund calls.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Returns the number of captured payments.
    pub fn payment_count(&self) -> usize {
        self.state.read().unwrap().payments.len()
    }

    /// Returns true if a payment exists with the given ID.
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.state.read().unwrap().payments.contains_key(payment_id)
    }

    /// Returns the number of charge attempts received.
    pub fn charge_call_count(&self) -> u32 {
        self.state.read().unwrap().charge_calls
    }

    /// Returns the number of refund attempts received.
    pub fn refund_call_count(&self) -> u32 {
        self.state.read().unwrap().refund_calls
    }
}

#[async_trait]
impl PaymentClient for InMemoryPaymentClient {
    async fn charge(
        &self,
        order_id: AggregateId,
        customer_id: CustomerId,
        amount: Money,
    ) -> Result<Payment, ClientError> {
        let mut state = self.state.write().unwrap();
        state.charge_calls += 1;

        if state.transient_charge_failures > 0 {
            state.transient_charge_failures -= 1;
            return Err(ClientError::Unavailable(
                "payment service timed out".to_string(),
            ));
        }

        if state.fail_on_charge {
            return Err(ClientError::Rejected("payment declined".to_string()));
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state
            .payments
            .insert(payment_id.clone(), (order_id, customer_id, amount));

        Ok(Payment { payment_id })
    }

    async fn refund(&self, payment_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.write().unwrap();
        state.refund_calls += 1;

        if state.fail_on_refund {
            return Err(ClientError::Unavailable(
                "payment service unreachable".to_string(),
            ));
        }

        state.payments.remove(payment_id);
        Ok(())
    }
}
