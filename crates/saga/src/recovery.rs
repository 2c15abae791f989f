//! Recovery sweep for sagas stranded by a crash between steps.
//!
//! The synchronous saga loses its driving request if the process dies after
//! a remote step succeeded but before the next transition committed. The
//! sweep finds orders stuck in `InventoryReserved` or `PaymentProcessed`
//! beyond the staleness threshold and compensates them using the step IDs
//! persisted with each transition. Orders stuck in `Started` made no remote
//! call, so they are cancelled outright. Resuming a stalled payment is
//! never attempted; a replayed charge could double-bill the customer.

use std::sync::Arc;

use chrono::Utc;
use domain::{AggregateRoot, SagaStatus};
use store::OrderStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clients::{InventoryClient, PaymentClient};
use crate::error::SagaError;
use crate::orchestrator::OrderSagaOrchestrator;

/// Outcome of one recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Stalled orders examined.
    pub examined: usize,
    /// Orders compensated (a remote step had completed).
    pub compensated: usize,
    /// Orders cancelled (no remote step had completed).
    pub cancelled: usize,
}

impl<S, I, P> OrderSagaOrchestrator<S, I, P>
where
    S: OrderStore,
    I: InventoryClient,
    P: PaymentClient,
{
    /// Runs one recovery pass over stalled sagas.
    #[tracing::instrument(skip(self))]
    pub async fn recover_stalled(&self) -> Result<RecoverySummary, SagaError> {
        let cutoff = Utc::now() - self.config.stale_after;
        let stalled = self
            .store
            .stalled_orders(
                &[
                    SagaStatus::Started,
                    SagaStatus::InventoryReserved,
                    SagaStatus::PaymentProcessed,
                ],
                cutoff,
            )
            .await?;

        let mut summary = RecoverySummary {
            examined: stalled.len(),
            ..Default::default()
        };

        for mut order in stalled {
            match order.saga_status() {
                SagaStatus::Started => {
                    tracing::warn!(order_id = %order.id(), "cancelling order that never left Started");
                    order.cancel()?;
                    self.store.save_order(order, vec![]).await?;
                    summary.cancelled += 1;
                    metrics::counter!("saga_recovery_cancelled").increment(1);
                }
                SagaStatus::InventoryReserved | SagaStatus::PaymentProcessed => {
                    tracing::warn!(
                        order_id = %order.id(),
                        saga_status = %order.saga_status(),
                        "compensating stalled saga"
                    );
                    self.compensate(order, "saga stalled past the staleness threshold")
                        .await?;
                    summary.compensated += 1;
                    metrics::counter!("saga_recovery_compensated").increment(1);
                }
                _ => {}
            }
        }

        if summary.examined > 0 {
            tracing::info!(
                examined = summary.examined,
                compensated = summary.compensated,
                cancelled = summary.cancelled,
                "recovery sweep finished"
            );
        }

        Ok(summary)
    }
}

impl<S, I, P> OrderSagaOrchestrator<S, I, P>
where
    S: OrderStore + 'static,
    I: InventoryClient + 'static,
    P: PaymentClient + 'static,
{
    /// Spawns the periodic recovery sweep.
    pub fn spawn_recovery(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(error) = self.recover_stalled().await {
                    tracing::error!(%error, "recovery sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{InMemoryInventoryClient, InMemoryPaymentClient};
    use crate::orchestrator::SagaConfig;
    use domain::{Currency, CustomerId, Money, Order, OrderLine, OrderStatus};
    use store::InMemoryStore;

    fn orchestrator(
        stale_after: chrono::Duration,
    ) -> (
        OrderSagaOrchestrator<InMemoryStore, InMemoryInventoryClient, InMemoryPaymentClient>,
        InMemoryStore,
        InMemoryInventoryClient,
        InMemoryPaymentClient,
    ) {
        let store = InMemoryStore::new();
        let inventory = InMemoryInventoryClient::new();
        let payment = InMemoryPaymentClient::new();
        let config = SagaConfig {
            stale_after,
            ..SagaConfig::default()
        };
        let orchestrator = OrderSagaOrchestrator::new(
            store.clone(),
            inventory.clone(),
            payment.clone(),
            config,
        );
        (orchestrator, store, inventory, payment)
    }

    fn order() -> Order {
        Order::new(
            CustomerId::new(),
            vec![OrderLine::new(
                "SKU-001",
                1,
                Money::from_minor(1000, Currency::Usd),
            )],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sweep_compensates_reserved_orders() {
        // Zero staleness: everything in flight counts as stalled.
        let (orchestrator, store, inventory, payment) =
            orchestrator(chrono::Duration::zero());

        let mut stuck = order();
        stuck.mark_inventory_reserved("RES-0042").unwrap();
        let id = stuck.id();
        store.save_order(stuck, vec![]).await.unwrap();

        let summary = orchestrator.recover_stalled().await.unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.compensated, 1);
        assert_eq!(summary.cancelled, 0);

        let recovered = store.get_order(id).await.unwrap().unwrap();
        assert_eq!(recovered.status(), OrderStatus::Failed);
        assert_eq!(recovered.saga_status(), SagaStatus::Compensated);
        assert!(recovered.failure_reason().unwrap().contains("stalled"));

        assert_eq!(inventory.release_call_count(), 1);
        assert_eq!(payment.refund_call_count(), 0);
    }

    #[tokio::test]
    async fn sweep_refunds_and_releases_payment_processed_orders() {
        let (orchestrator, store, inventory, payment) =
            orchestrator(chrono::Duration::zero());

        let mut stuck = order();
        stuck.mark_inventory_reserved("RES-0042").unwrap();
        stuck.mark_payment_processed("PAY-0042").unwrap();
        store.save_order(stuck, vec![]).await.unwrap();

        let summary = orchestrator.recover_stalled().await.unwrap();
        assert_eq!(summary.compensated, 1);
        assert_eq!(payment.refund_call_count(), 1);
        assert_eq!(inventory.release_call_count(), 1);
    }

    #[tokio::test]
    async fn sweep_cancels_orders_that_never_started_a_step() {
        let (orchestrator, store, inventory, payment) =
            orchestrator(chrono::Duration::zero());

        let stuck = order();
        let id = stuck.id();
        store.save_order(stuck, vec![]).await.unwrap();

        let summary = orchestrator.recover_stalled().await.unwrap();
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.compensated, 0);

        let recovered = store.get_order(id).await.unwrap().unwrap();
        assert_eq!(recovered.status(), OrderStatus::Cancelled);
        assert_eq!(recovered.saga_status(), SagaStatus::Compensated);

        // Nothing remote to undo.
        assert_eq!(inventory.release_call_count(), 0);
        assert_eq!(payment.refund_call_count(), 0);
    }

    #[tokio::test]
    async fn fresh_orders_are_left_alone() {
        let (orchestrator, store, _inventory, _payment) =
            orchestrator(chrono::Duration::hours(1));

        let mut fresh = order();
        fresh.mark_inventory_reserved("RES-0001").unwrap();
        store.save_order(fresh, vec![]).await.unwrap();

        let summary = orchestrator.recover_stalled().await.unwrap();
        assert_eq!(summary, RecoverySummary::default());
    }

    #[tokio::test]
    async fn terminal_orders_are_never_touched() {
        let (orchestrator, store, _inventory, _payment) =
            orchestrator(chrono::Duration::zero());

        let mut done = order();
        done.mark_inventory_reserved("RES-0001").unwrap();
        done.mark_payment_processed("PAY-0001").unwrap();
        done.confirm().unwrap();
        let id = done.id();
        store.save_order(done, vec![]).await.unwrap();

        let summary = orchestrator.recover_stalled().await.unwrap();
        assert_eq!(summary.examined, 0);

        let untouched = store.get_order(id).await.unwrap().unwrap();
        assert_eq!(untouched.status(), OrderStatus::Confirmed);
    }
}
