//! Procurement application service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{AggregateId, RequestContext};
use domain::{
    AggregateRoot, BidId, BuyerId, DomainEvent, Money, Procurement, ProcurementError, Quantity,
    VendorId,
};
use store::{OutboxRecord, ProcurementFilter, ProcurementStore, StoreError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Errors surfaced by the procurement service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A domain rule or validation failed.
    #[error("procurement error: {0}")]
    Procurement(#[from] ProcurementError),

    /// The store rejected an operation (including stale-version conflicts).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The procurement does not exist.
    #[error("procurement not found: {0}")]
    NotFound(AggregateId),
}

/// Input for creating a procurement.
#[derive(Debug, Clone)]
pub struct CreateProcurement {
    pub title: String,
    pub description: String,
    pub quantity: Quantity,
    pub budget: Money,
    pub deadline: DateTime<Utc>,
    pub buyer_id: BuyerId,
}

/// Input for submitting a bid.
#[derive(Debug, Clone)]
pub struct SubmitBid {
    pub procurement_id: AggregateId,
    pub vendor_id: VendorId,
    pub amount: Money,
    pub notes: Option<String>,
}

/// Application service for the bidding workflow.
pub struct ProcurementService<S> {
    store: S,
}

impl<S: ProcurementStore> ProcurementService<S> {
    /// Creates a new service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a procurement in `Draft` state and records the
    /// ProcurementCreated event.
    #[tracing::instrument(skip(self, ctx, cmd), fields(correlation_id = %ctx.correlation_id))]
    pub async fn create_procurement(
        &self,
        ctx: &RequestContext,
        cmd: CreateProcurement,
    ) -> Result<Procurement, ServiceError> {
        let procurement = Procurement::new(
            cmd.title,
            cmd.description,
            cmd.quantity,
            cmd.budget,
            cmd.deadline,
            cmd.buyer_id,
        )?;

        let event = DomainEvent::procurement_created(&procurement);
        let procurement = self
            .store
            .save_procurement(procurement, vec![OutboxRecord::for_event(&event)?])
            .await?;

        metrics::counter!("procurements_created").increment(1);
        tracing::info!(procurement_id = %procurement.id(), title = %procurement.title(), "procurement created");
        Ok(procurement)
    }

    /// Publishes a draft procurement and opens bidding in one operation.
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn publish_procurement(
        &self,
        ctx: &RequestContext,
        procurement_id: AggregateId,
    ) -> Result<Procurement, ServiceError> {
        let mut procurement = self.load(procurement_id).await?;
        procurement.publish(Utc::now())?;
        procurement.open_bidding()?;
        let procurement = self.store.save_procurement(procurement, vec![]).await?;

        tracing::info!(%procurement_id, "procurement published and bidding opened");
        Ok(procurement)
    }

    /// Submits a bid and records the BidSubmitted event.
    #[tracing::instrument(
        skip(self, ctx, cmd),
        fields(correlation_id = %ctx.correlation_id, procurement_id = %cmd.procurement_id)
    )]
    pub async fn submit_bid(
        &self,
        ctx: &RequestContext,
        cmd: SubmitBid,
    ) -> Result<Procurement, ServiceError> {
        let mut procurement = self.load(cmd.procurement_id).await?;
        let bid = procurement
            .add_bid(cmd.vendor_id, cmd.amount, cmd.notes, Utc::now())?
            .clone();

        let event = DomainEvent::bid_submitted(&procurement, &bid);
        let procurement = self
            .store
            .save_procurement(procurement, vec![OutboxRecord::for_event(&event)?])
            .await?;

        metrics::counter!("bids_submitted").increment(1);
        tracing::info!(bid_id = %bid.id(), vendor_id = %bid.vendor_id(), "bid submitted");
        Ok(procurement)
    }

    /// Closes bidding.
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn close_bidding(
        &self,
        ctx: &RequestContext,
        procurement_id: AggregateId,
    ) -> Result<Procurement, ServiceError> {
        let mut procurement = self.load(procurement_id).await?;
        procurement.close_bidding()?;
        let procurement = self.store.save_procurement(procurement, vec![]).await?;

        tracing::info!(%procurement_id, "bidding closed");
        Ok(procurement)
    }

    /// Awards the procurement to a bid and records the ProcurementAwarded
    /// event.
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn award_procurement(
        &self,
        ctx: &RequestContext,
        procurement_id: AggregateId,
        bid_id: BidId,
    ) -> Result<Procurement, ServiceError> {
        let mut procurement = self.load(procurement_id).await?;
        procurement.award_bid(bid_id)?;

        let winner = procurement
            .bid(bid_id)
            .ok_or(ProcurementError::BidNotFound { bid_id })?
            .clone();
        let event = DomainEvent::procurement_awarded(&procurement, &winner);
        let procurement = self
            .store
            .save_procurement(procurement, vec![OutboxRecord::for_event(&event)?])
            .await?;

        metrics::counter!("procurements_awarded").increment(1);
        tracing::info!(%procurement_id, %bid_id, "procurement awarded");
        Ok(procurement)
    }

    /// Cancels the procurement and rejects its submitted bids.
    #[tracing::instrument(skip(self, ctx), fields(correlation_id = %ctx.correlation_id))]
    pub async fn cancel_procurement(
        &self,
        ctx: &RequestContext,
        procurement_id: AggregateId,
    ) -> Result<Procurement, ServiceError> {
        let mut procurement = self.load(procurement_id).await?;
        procurement.cancel()?;
        let procurement = self.store.save_procurement(procurement, vec![]).await?;

        tracing::info!(%procurement_id, "procurement cancelled");
        Ok(procurement)
    }

    /// Loads a procurement by ID.
    pub async fn get_procurement(
        &self,
        procurement_id: AggregateId,
    ) -> Result<Option<Procurement>, ServiceError> {
        Ok(self.store.get_procurement(procurement_id).await?)
    }

    /// Lists procurements matching the filter.
    pub async fn list_procurements(
        &self,
        filter: &ProcurementFilter,
    ) -> Result<Vec<Procurement>, ServiceError> {
        Ok(self.store.list_procurements(filter).await?)
    }

    /// Closes bidding on every procurement whose deadline has passed.
    ///
    /// Runs as a periodic sweep; each procurement is closed independently
    /// under its own version check.
    #[tracing::instrument(skip(self))]
    pub async fn close_expired_bidding(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let expired = self.store.procurements_open_past_deadline(now).await?;
        let mut closed = 0;

        for mut procurement in expired {
            let id = procurement.id();
            procurement.close_bidding()?;
            self.store.save_procurement(procurement, vec![]).await?;
            closed += 1;
            tracing::info!(procurement_id = %id, "closed expired bidding");
        }

        if closed > 0 {
            metrics::counter!("procurements_bidding_expired").increment(closed as u64);
        }
        Ok(closed)
    }

    async fn load(&self, procurement_id: AggregateId) -> Result<Procurement, ServiceError> {
        self.store
            .get_procurement(procurement_id)
            .await?
            .ok_or(ServiceError::NotFound(procurement_id))
    }
}

impl<S: ProcurementStore + 'static> ProcurementService<S> {
    /// Spawns the periodic expired-bidding sweep.
    pub fn spawn_expiry_sweep(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(error) = self.close_expired_bidding(Utc::now()).await {
                    tracing::error!(%error, "expired-bidding sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::{BidStatus, Currency, ProcurementStatus, Unit};
    use store::InMemoryStore;

    fn service() -> (ProcurementService<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        (ProcurementService::new(store.clone()), store)
    }

    fn create_cmd(budget_major: i64) -> CreateProcurement {
        CreateProcurement {
            title: "Seed Procurement".to_string(),
            description: "Certified maize seed".to_string(),
            quantity: Quantity::new(200, Unit::Kilogram).unwrap(),
            budget: Money::from_major(budget_major, Currency::Usd),
            deadline: Utc::now() + Duration::days(30),
            buyer_id: BuyerId::new("buyer-coop-1"),
        }
    }

    fn bid(procurement_id: AggregateId, vendor: &str, amount_major: i64) -> SubmitBid {
        SubmitBid {
            procurement_id,
            vendor_id: VendorId::new(vendor),
            amount: Money::from_major(amount_major, Currency::Usd),
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_records_the_event_with_the_save() {
        let (service, store) = service();
        let ctx = RequestContext::new();

        let procurement = service
            .create_procurement(&ctx, create_cmd(10_000))
            .await
            .unwrap();

        assert_eq!(procurement.status(), ProcurementStatus::Draft);
        let records = store.outbox_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "ProcurementCreated");
        assert_eq!(records[0].aggregate_id, procurement.id());
    }

    #[tokio::test]
    async fn full_bidding_round_through_the_service() {
        let (service, store) = service();
        let ctx = RequestContext::new();

        let procurement = service
            .create_procurement(&ctx, create_cmd(10_000))
            .await
            .unwrap();
        let id = procurement.id();

        let procurement = service.publish_procurement(&ctx, id).await.unwrap();
        assert_eq!(procurement.status(), ProcurementStatus::BiddingOpen);

        let procurement = service
            .submit_bid(&ctx, bid(id, "vendor-a", 9_000))
            .await
            .unwrap();
        let bid_a = procurement.bids()[0].id();

        let procurement = service
            .submit_bid(&ctx, bid(id, "vendor-b", 9_500))
            .await
            .unwrap();
        let bid_b = procurement.bids()[1].id();

        service.close_bidding(&ctx, id).await.unwrap();
        let procurement = service.award_procurement(&ctx, id, bid_a).await.unwrap();

        assert_eq!(procurement.status(), ProcurementStatus::Awarded);
        assert_eq!(procurement.awarded_bid_id(), Some(bid_a));
        assert_eq!(procurement.bid(bid_a).unwrap().status(), BidStatus::Accepted);
        assert_eq!(procurement.bid(bid_b).unwrap().status(), BidStatus::Rejected);

        let types: Vec<String> = store
            .outbox_records()
            .await
            .iter()
            .map(|r| r.event_type.clone())
            .collect();
        assert_eq!(
            types,
            [
                "ProcurementCreated",
                "BidSubmitted",
                "BidSubmitted",
                "ProcurementAwarded"
            ]
        );
    }

    #[tokio::test]
    async fn unknown_procurement_is_not_found() {
        let (service, _) = service();
        let result = service
            .publish_procurement(&RequestContext::new(), AggregateId::new())
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn rule_violations_propagate() {
        let (service, _) = service();
        let ctx = RequestContext::new();

        let procurement = service
            .create_procurement(&ctx, create_cmd(10_000))
            .await
            .unwrap();

        // Bidding has not opened.
        let result = service
            .submit_bid(&ctx, bid(procurement.id(), "vendor-a", 9_000))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Procurement(ProcurementError::BiddingNotOpen))
        ));
    }

    #[tokio::test]
    async fn over_budget_bid_is_rejected_without_an_event() {
        let (service, store) = service();
        let ctx = RequestContext::new();

        let procurement = service
            .create_procurement(&ctx, create_cmd(10_000))
            .await
            .unwrap();
        let id = procurement.id();
        service.publish_procurement(&ctx, id).await.unwrap();

        let result = service.submit_bid(&ctx, bid(id, "vendor-a", 11_000)).await;
        assert!(matches!(
            result,
            Err(ServiceError::Procurement(ProcurementError::BidOverBudget))
        ));

        // Only the creation event is in the outbox.
        assert_eq!(store.outbox_records().await.len(), 1);
    }

    #[tokio::test]
    async fn expired_bidding_sweep_closes_open_procurements() {
        let (service, _) = service();
        let ctx = RequestContext::new();

        let procurement = service
            .create_procurement(&ctx, create_cmd(10_000))
            .await
            .unwrap();
        let id = procurement.id();
        service.publish_procurement(&ctx, id).await.unwrap();

        // Nothing expires while the deadline is ahead.
        let closed = service.close_expired_bidding(Utc::now()).await.unwrap();
        assert_eq!(closed, 0);

        // Past the deadline the sweep closes it.
        let closed = service
            .close_expired_bidding(Utc::now() + Duration::days(31))
            .await
            .unwrap();
        assert_eq!(closed, 1);

        let procurement = service.get_procurement(id).await.unwrap().unwrap();
        assert_eq!(procurement.status(), ProcurementStatus::BiddingClosed);
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_buyer() {
        let (service, _) = service();
        let ctx = RequestContext::new();

        let first = service
            .create_procurement(&ctx, create_cmd(10_000))
            .await
            .unwrap();
        service
            .create_procurement(
                &ctx,
                CreateProcurement {
                    buyer_id: BuyerId::new("buyer-other"),
                    ..create_cmd(5_000)
                },
            )
            .await
            .unwrap();
        service.publish_procurement(&ctx, first.id()).await.unwrap();

        let open = service
            .list_procurements(
                &ProcurementFilter::new().with_status(ProcurementStatus::BiddingOpen),
            )
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id(), first.id());

        let by_buyer = service
            .list_procurements(&ProcurementFilter::new().with_buyer(BuyerId::new("buyer-other")))
            .await
            .unwrap();
        assert_eq!(by_buyer.len(), 1);
    }
}
