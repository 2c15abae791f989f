//! Order saga orchestrator.

use common::{AggregateId, RequestContext};
use domain::{AggregateRoot, CustomerId, DomainEvent, Order, OrderLine};
use store::{OrderStore, OutboxRecord};

use crate::clients::{InventoryClient, PaymentClient, ReservationItem};
use crate::error::SagaError;
use crate::resilience::{BreakerPolicy, CircuitBreaker, StepPolicy, call_with_policy};

/// Saga policy configuration, passed as plain data.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Retry/timeout policy for the inventory step.
    pub inventory: StepPolicy,

    /// Retry/timeout policy for the payment step.
    pub payment: StepPolicy,

    /// Circuit breaker policy shared by both remote capabilities
    /// (each capability gets its own breaker instance).
    pub breaker: BreakerPolicy,

    /// Age after which an in-flight saga is considered stalled and picked
    /// up by the recovery sweep.
    pub stale_after: chrono::Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            inventory: StepPolicy::default(),
            payment: StepPolicy::default(),
            breaker: BreakerPolicy::default(),
            stale_after: chrono::Duration::minutes(5),
        }
    }
}

/// Drives an order through reserve inventory → process payment → confirm,
/// with compensating actions in reverse order on failure.
///
/// The orchestrator never talks to the bus directly: event records are
/// written to the outbox in the same save as the state transition they
/// describe.
pub struct OrderSagaOrchestrator<S, I, P> {
    pub(crate) store: S,
    pub(crate) inventory: I,
    pub(crate) payment: P,
    pub(crate) config: SagaConfig,
    pub(crate) inventory_breaker: CircuitBreaker,
    pub(crate) payment_breaker: CircuitBreaker,
}

impl<S, I, P> OrderSagaOrchestrator<S, I, P>
where
    S: OrderStore,
    I: InventoryClient,
    P: PaymentClient,
{
    /// Creates a new orchestrator.
    pub fn new(store: S, inventory: I, payment: P, config: SagaConfig) -> Self {
        let inventory_breaker = CircuitBreaker::new(config.breaker.clone());
        let payment_breaker = CircuitBreaker::new(config.breaker.clone());
        Self {
            store,
            inventory,
            payment,
            config,
            inventory_breaker,
            payment_breaker,
        }
    }

    /// Creates an order and synchronously drives its saga to completion or
    /// failure before returning.
    ///
    /// Remote-step failures do not propagate: the order comes back `Failed`
    /// with its saga `Compensated` and the triggering error recorded.
    /// Validation errors and stale-version conflicts do propagate.
    #[tracing::instrument(
        skip(self, ctx, lines),
        fields(correlation_id = %ctx.correlation_id)
    )]
    pub async fn create_order(
        &self,
        ctx: &RequestContext,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
    ) -> Result<Order, SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let order = Order::new(customer_id, lines)?;
        let created = DomainEvent::order_created(&order);
        let mut order = self
            .store
            .save_order(order, vec![OutboxRecord::for_event(&created)?])
            .await?;
        tracing::info!(order_id = %order.id(), %customer_id, "order saga started");

        // Step 1: reserve inventory. No partial reservation state is kept
        // locally until the remote call returns a reservation ID.
        let items: Vec<ReservationItem> = order
            .lines()
            .iter()
            .map(|line| ReservationItem {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            })
            .collect();

        let order_id = order.id();
        let reservation = match call_with_policy(
            "inventory-service",
            &self.config.inventory,
            &self.inventory_breaker,
            || self.inventory.reserve(order_id, items.clone()),
        )
        .await
        {
            Ok(reservation) => reservation,
            Err(error) => {
                let order = self.compensate(order, &error.to_string()).await?;
                self.finish_metrics(saga_start, false);
                return Ok(order);
            }
        };

        // Persist the reservation ID before attempting payment, so
        // compensation knows what to undo even after a crash.
        order.mark_inventory_reserved(&reservation.reservation_id)?;
        order = self.store.save_order(order, vec![]).await?;
        tracing::info!(
            order_id = %order.id(),
            reservation_id = %reservation.reservation_id,
            "inventory reserved"
        );

        // Step 2: process payment.
        let amount = order.total_amount();
        let payment = match call_with_policy(
            "payment-service",
            &self.config.payment,
            &self.payment_breaker,
            || self.payment.charge(order_id, customer_id, amount),
        )
        .await
        {
            Ok(payment) => payment,
            Err(error) => {
                let order = self.compensate(order, &error.to_string()).await?;
                self.finish_metrics(saga_start, false);
                return Ok(order);
            }
        };

        order.mark_payment_processed(&payment.payment_id)?;
        order = self.store.save_order(order, vec![]).await?;
        tracing::info!(
            order_id = %order.id(),
            payment_id = %payment.payment_id,
            "payment processed"
        );

        // Confirm.
        order.confirm()?;
        let confirmed = DomainEvent::order_confirmed(&order);
        let order = self
            .store
            .save_order(order, vec![OutboxRecord::for_event(&confirmed)?])
            .await?;

        self.finish_metrics(saga_start, true);
        tracing::info!(order_id = %order.id(), "order saga completed");
        Ok(order)
    }

    /// Undoes completed steps in reverse order and finalizes the order.
    ///
    /// Each undo action is attempted independently; a failed undo is logged
    /// and noted on the order but never blocks the other undo action or the
    /// final `Compensated`/`Failed` marking.
    pub(crate) async fn compensate(
        &self,
        mut order: Order,
        reason: &str,
    ) -> Result<Order, SagaError> {
        tracing::warn!(order_id = %order.id(), reason, "starting compensation");
        metrics::counter!("saga_compensations_total").increment(1);

        order.begin_compensation()?;
        let mut order = self.store.save_order(order, vec![]).await?;

        let mut unconfirmed: Vec<&'static str> = Vec::new();

        if let Some(payment_id) = order.payment_id().map(String::from) {
            match tokio::time::timeout(
                self.config.payment.timeout,
                self.payment.refund(&payment_id),
            )
            .await
            {
                Ok(Ok(())) => {
                    tracing::info!(order_id = %order.id(), %payment_id, "payment refunded");
                }
                Ok(Err(error)) => {
                    tracing::error!(order_id = %order.id(), %payment_id, %error, "failed to refund payment");
                    unconfirmed.push("refund_payment");
                }
                Err(_) => {
                    tracing::error!(order_id = %order.id(), %payment_id, "refund timed out");
                    unconfirmed.push("refund_payment");
                }
            }
        }

        if let Some(reservation_id) = order.reservation_id().map(String::from) {
            match tokio::time::timeout(
                self.config.inventory.timeout,
                self.inventory.release(&reservation_id),
            )
            .await
            {
                Ok(Ok(())) => {
                    tracing::info!(order_id = %order.id(), %reservation_id, "reservation released");
                }
                Ok(Err(error)) => {
                    tracing::error!(order_id = %order.id(), %reservation_id, %error, "failed to release reservation");
                    unconfirmed.push("release_reservation");
                }
                Err(_) => {
                    tracing::error!(order_id = %order.id(), %reservation_id, "release timed out");
                    unconfirmed.push("release_reservation");
                }
            }
        }

        let reason = if unconfirmed.is_empty() {
            reason.to_string()
        } else {
            metrics::counter!("saga_compensations_partial").increment(1);
            format!(
                "{reason}; unconfirmed compensation steps: {}",
                unconfirmed.join(", ")
            )
        };

        order.mark_compensated(&reason)?;
        let failed = DomainEvent::order_failed(&order, &reason);
        let order = self
            .store
            .save_order(order, vec![OutboxRecord::for_event(&failed)?])
            .await?;

        tracing::info!(order_id = %order.id(), "compensation completed");
        Ok(order)
    }

    /// Loads an order by ID.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, SagaError> {
        Ok(self.store.get_order(order_id).await?)
    }

    /// Lists all orders placed by a customer.
    pub async fn customer_orders(&self, customer_id: CustomerId) -> Result<Vec<Order>, SagaError> {
        Ok(self.store.orders_by_customer(customer_id).await?)
    }

    fn finish_metrics(&self, started: std::time::Instant, completed: bool) {
        metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
        if completed {
            metrics::counter!("saga_completed").increment(1);
        } else {
            metrics::counter!("saga_failed").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{InMemoryInventoryClient, InMemoryPaymentClient};
    use domain::{Currency, Money, OrderStatus, SagaStatus};
    use store::InMemoryStore;

    fn fast_config() -> SagaConfig {
        SagaConfig {
            inventory: StepPolicy {
                max_attempts: 3,
                backoff: std::time::Duration::from_millis(1),
                timeout: std::time::Duration::from_millis(100),
            },
            payment: StepPolicy {
                max_attempts: 3,
                backoff: std::time::Duration::from_millis(1),
                timeout: std::time::Duration::from_millis(100),
            },
            ..SagaConfig::default()
        }
    }

    fn setup() -> (
        OrderSagaOrchestrator<InMemoryStore, InMemoryInventoryClient, InMemoryPaymentClient>,
        InMemoryStore,
        InMemoryInventoryClient,
        InMemoryPaymentClient,
    ) {
        let store = InMemoryStore::new();
        let inventory = InMemoryInventoryClient::new();
        let payment = InMemoryPaymentClient::new();
        let orchestrator = OrderSagaOrchestrator::new(
            store.clone(),
            inventory.clone(),
            payment.clone(),
            fast_config(),
        );
        (orchestrator, store, inventory, payment)
    }

    fn lines() -> Vec<OrderLine> {
        vec![
            OrderLine::new("SKU-001", 3, Money::from_minor(1000, Currency::Usd)),
            OrderLine::new("SKU-002", 1, Money::from_minor(500, Currency::Usd)),
        ]
    }

    #[tokio::test]
    async fn happy_path_confirms_order() {
        let (orchestrator, store, inventory, payment) = setup();
        let ctx = RequestContext::new();

        let order = orchestrator
            .create_order(&ctx, CustomerId::new(), lines())
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.saga_status(), SagaStatus::Completed);
        assert_eq!(order.total_amount().minor(), 3500);
        assert!(order.reservation_id().is_some());
        assert!(order.payment_id().is_some());

        // Zero compensation calls were issued.
        assert_eq!(inventory.release_call_count(), 0);
        assert_eq!(payment.refund_call_count(), 0);
        assert_eq!(inventory.reservation_count(), 1);
        assert_eq!(payment.payment_count(), 1);

        // OrderCreated and OrderConfirmed went through the outbox.
        let records = store.outbox_records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, "OrderCreated");
        assert_eq!(records[1].event_type, "OrderConfirmed");
    }

    #[tokio::test]
    async fn inventory_failure_fails_order_without_payment_attempt() {
        let (orchestrator, store, inventory, payment) = setup();
        inventory.set_fail_on_reserve(true);

        let order = orchestrator
            .create_order(&RequestContext::new(), CustomerId::new(), lines())
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Failed);
        assert_eq!(order.saga_status(), SagaStatus::Compensated);
        assert!(order.failure_reason().unwrap().contains("insufficient stock"));

        // No payment was attempted; nothing needed releasing.
        assert_eq!(payment.charge_call_count(), 0);
        assert_eq!(inventory.release_call_count(), 0);

        let records = store.outbox_records().await;
        let types: Vec<&str> = records.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(types, ["OrderCreated", "OrderFailed"]);
    }

    #[tokio::test]
    async fn payment_failure_releases_the_reservation() {
        let (orchestrator, _store, inventory, payment) = setup();
        payment.set_fail_on_charge(true);

        let order = orchestrator
            .create_order(&RequestContext::new(), CustomerId::new(), lines())
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Failed);
        assert_eq!(order.saga_status(), SagaStatus::Compensated);
        assert!(order.failure_reason().unwrap().contains("payment declined"));

        // Exactly one release for the reservation made earlier.
        assert_eq!(inventory.release_call_count(), 1);
        assert_eq!(inventory.reservation_count(), 0);
        // The failed charge captured nothing, so no refund call.
        assert_eq!(payment.refund_call_count(), 0);
        // The reservation ID the saga persisted is the one that was undone.
        assert!(order.reservation_id().is_some());
    }

    #[tokio::test]
    async fn transient_inventory_outage_is_retried() {
        let (orchestrator, _store, inventory, _payment) = setup();
        inventory.fail_reserve_transiently(2);

        let order = orchestrator
            .create_order(&RequestContext::new(), CustomerId::new(), lines())
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(inventory.reserve_call_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_trigger_compensation() {
        let (orchestrator, _store, inventory, payment) = setup();
        // More transient failures than the attempt budget.
        inventory.fail_reserve_transiently(10);

        let order = orchestrator
            .create_order(&RequestContext::new(), CustomerId::new(), lines())
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Failed);
        assert_eq!(inventory.reserve_call_count(), 3);
        assert_eq!(payment.charge_call_count(), 0);
    }

    #[tokio::test]
    async fn failed_refund_does_not_block_release_or_finalization() {
        let (orchestrator, _store, inventory, payment) = setup();

        // Build an order with both remote steps recorded, then compensate it.
        let order = Order::new(CustomerId::new(), lines()).unwrap();
        let order = orchestrator.store.save_order(order, vec![]).await.unwrap();
        let mut order = order;
        order.mark_inventory_reserved("RES-0001").unwrap();
        order.mark_payment_processed("PAY-0001").unwrap();
        let order = orchestrator.store.save_order(order, vec![]).await.unwrap();

        payment.set_fail_on_refund(true);

        let order = orchestrator
            .compensate(order, "shipment window closed")
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Failed);
        assert_eq!(order.saga_status(), SagaStatus::Compensated);
        // The release still ran even though the refund failed.
        assert_eq!(payment.refund_call_count(), 1);
        assert_eq!(inventory.release_call_count(), 1);
        // The unconfirmed undo step is noted for manual reconciliation.
        assert!(
            order
                .failure_reason()
                .unwrap()
                .contains("unconfirmed compensation steps: refund_payment")
        );
    }

    #[tokio::test]
    async fn validation_errors_propagate_to_the_caller() {
        let (orchestrator, store, _inventory, _payment) = setup();

        let result = orchestrator
            .create_order(&RequestContext::new(), CustomerId::new(), vec![])
            .await;
        assert!(matches!(result, Err(SagaError::Order(_))));

        // Nothing was persisted and no event was recorded.
        assert_eq!(store.order_count().await, 0);
        assert!(store.outbox_records().await.is_empty());
    }

    #[tokio::test]
    async fn open_circuit_fast_fails_new_orders() {
        let (orchestrator, _store, inventory, _payment) = setup();
        inventory.fail_reserve_transiently(100);

        // Two failed sagas (3 attempts each) push the breaker past its
        // default threshold of 5 consecutive failures.
        for _ in 0..2 {
            orchestrator
                .create_order(&RequestContext::new(), CustomerId::new(), lines())
                .await
                .unwrap();
        }
        let calls_so_far = inventory.reserve_call_count();
        assert!(orchestrator.inventory_breaker.is_open());

        let order = orchestrator
            .create_order(&RequestContext::new(), CustomerId::new(), lines())
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Failed);
        assert!(order.failure_reason().unwrap().contains("circuit is open"));
        // The client was never called while the circuit was open.
        assert_eq!(inventory.reserve_call_count(), calls_so_far);
    }

    #[tokio::test]
    async fn queries_return_persisted_orders() {
        let (orchestrator, _store, _inventory, _payment) = setup();
        let customer_id = CustomerId::new();

        let order = orchestrator
            .create_order(&RequestContext::new(), customer_id, lines())
            .await
            .unwrap();

        let loaded = orchestrator.get_order(order.id()).await.unwrap().unwrap();
        assert_eq!(loaded.id(), order.id());

        let orders = orchestrator.customer_orders(customer_id).await.unwrap();
        assert_eq!(orders.len(), 1);

        assert!(
            orchestrator
                .get_order(AggregateId::new())
                .await
                .unwrap()
                .is_none()
        );
    }
}
