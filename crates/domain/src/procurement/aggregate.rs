//! Procurement aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRoot;
use crate::money::Money;
use crate::quantity::Quantity;

use super::bid::{Bid, BidStatus};
use super::ids::{BidId, BuyerId, VendorId};
use super::state::ProcurementStatus;
use super::ProcurementError;

/// Procurement aggregate root.
///
/// Guards the bidding invariants: at most one submitted bid per vendor, bid
/// currency matching the budget, bids within budget, and the award selecting
/// exactly one bid while rejecting the rest as a single atomic side effect.
///
/// Time-sensitive operations take `now` explicitly so callers (and tests)
/// control the clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procurement {
    id: AggregateId,
    title: String,
    description: String,
    quantity: Quantity,
    budget: Money,
    deadline: DateTime<Utc>,
    buyer_id: BuyerId,
    status: ProcurementStatus,
    bids: Vec<Bid>,
    awarded_bid_id: Option<BidId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: Version,
}

impl AggregateRoot for Procurement {
    fn aggregate_type() -> &'static str {
        "Procurement"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

impl Procurement {
    /// Creates a new draft procurement.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        quantity: Quantity,
        budget: Money,
        deadline: DateTime<Utc>,
        buyer_id: BuyerId,
    ) -> Result<Self, ProcurementError> {
        let title = title.into();
        let description = description.into();
        validate_details(&title, &description, budget, &buyer_id)?;

        let now = Utc::now();
        Ok(Self {
            id: AggregateId::new(),
            title,
            description,
            quantity,
            budget,
            deadline,
            buyer_id,
            status: ProcurementStatus::Draft,
            bids: Vec::new(),
            awarded_bid_id: None,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        })
    }

    /// Publishes a draft procurement.
    ///
    /// The deadline must be at least one full day in the future.
    pub fn publish(&mut self, now: DateTime<Utc>) -> Result<(), ProcurementError> {
        if self.status != ProcurementStatus::Draft {
            return Err(ProcurementError::PublishRequiresDraft);
        }
        if self.deadline < now + Duration::days(1) {
            return Err(ProcurementError::DeadlineTooSoon);
        }
        self.status = ProcurementStatus::Published;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Opens bidding on a published procurement.
    pub fn open_bidding(&mut self) -> Result<(), ProcurementError> {
        if self.status != ProcurementStatus::Published {
            return Err(ProcurementError::OpenBiddingRequiresPublished);
        }
        self.status = ProcurementStatus::BiddingOpen;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Closes bidding.
    pub fn close_bidding(&mut self) -> Result<(), ProcurementError> {
        if self.status != ProcurementStatus::BiddingOpen {
            return Err(ProcurementError::CloseRequiresOpenBidding);
        }
        self.status = ProcurementStatus::BiddingClosed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Submits a bid from a vendor.
    ///
    /// Requires open bidding, an unexpired deadline, an amount within budget
    /// (same-currency comparison), and no other submitted bid from the same
    /// vendor. Returns a reference to the created bid.
    pub fn add_bid(
        &mut self,
        vendor_id: VendorId,
        amount: Money,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&Bid, ProcurementError> {
        if self.status != ProcurementStatus::BiddingOpen {
            return Err(ProcurementError::BiddingNotOpen);
        }
        if now > self.deadline {
            return Err(ProcurementError::DeadlinePassed);
        }
        if amount.is_greater_than(self.budget)? {
            return Err(ProcurementError::BidOverBudget);
        }
        if self
            .bids
            .iter()
            .any(|b| b.vendor_id() == &vendor_id && b.status() == BidStatus::Submitted)
        {
            return Err(ProcurementError::DuplicateBid { vendor_id });
        }

        let bid = Bid::new(vendor_id, amount, notes, now)?;
        self.bids.push(bid);
        self.updated_at = Utc::now();
        Ok(self.bids.last().expect("bid was just pushed"))
    }

    /// Awards the procurement to the given bid.
    ///
    /// Accepts the bid, records it as the awarded bid, moves the procurement
    /// to `Awarded`, and rejects every other still-submitted bid as a single
    /// atomic side effect.
    pub fn award_bid(&mut self, bid_id: BidId) -> Result<(), ProcurementError> {
        if self.status != ProcurementStatus::BiddingClosed {
            return Err(ProcurementError::AwardRequiresClosedBidding);
        }

        let winner = self
            .bids
            .iter_mut()
            .find(|b| b.id() == bid_id)
            .ok_or(ProcurementError::BidNotFound { bid_id })?;

        if winner.status() != BidStatus::Submitted {
            return Err(ProcurementError::BidNotSubmitted);
        }

        winner.accept();
        self.awarded_bid_id = Some(bid_id);
        self.status = ProcurementStatus::Awarded;

        for bid in &mut self.bids {
            if bid.id() != bid_id && bid.status() == BidStatus::Submitted {
                bid.reject();
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Cancels the procurement and rejects every still-submitted bid.
    ///
    /// Legal from any state except `Awarded`.
    pub fn cancel(&mut self) -> Result<(), ProcurementError> {
        if !self.status.can_cancel() {
            return Err(ProcurementError::CancelAfterAward);
        }
        self.status = ProcurementStatus::Cancelled;
        for bid in &mut self.bids {
            if bid.status() == BidStatus::Submitted {
                bid.reject();
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Updates the editable details of a draft procurement.
    pub fn update_details(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        quantity: Quantity,
        budget: Money,
        deadline: DateTime<Utc>,
    ) -> Result<(), ProcurementError> {
        if self.status != ProcurementStatus::Draft {
            return Err(ProcurementError::UpdateRequiresDraft);
        }
        let title = title.into();
        let description = description.into();
        validate_details(&title, &description, budget, &self.buyer_id)?;
        self.title = title;
        self.description = description;
        self.quantity = quantity;
        self.budget = budget;
        self.deadline = deadline;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns the submitted bid with the lowest amount, first-seen on ties.
    ///
    /// Used for reporting; the award is always explicit by bid ID.
    pub fn lowest_bid(&self) -> Option<&Bid> {
        self.bids
            .iter()
            .filter(|b| b.status() == BidStatus::Submitted)
            .fold(None, |lowest: Option<&Bid>, bid| match lowest {
                None => Some(bid),
                Some(current) => match bid.amount().is_less_than(current.amount()) {
                    Ok(true) => Some(bid),
                    _ => Some(current),
                },
            })
    }
}

// Query methods
impl Procurement {
    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the required quantity.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Returns the budget.
    pub fn budget(&self) -> Money {
        self.budget
    }

    /// Returns the bidding deadline.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Returns the buyer.
    pub fn buyer_id(&self) -> &BuyerId {
        &self.buyer_id
    }

    /// Returns the procurement status.
    pub fn status(&self) -> ProcurementStatus {
        self.status
    }

    /// Returns the bids in submission order.
    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    /// Returns a bid by ID.
    pub fn bid(&self, bid_id: BidId) -> Option<&Bid> {
        self.bids.iter().find(|b| b.id() == bid_id)
    }

    /// Returns the awarded bid ID, if awarded.
    pub fn awarded_bid_id(&self) -> Option<BidId> {
        self.awarded_bid_id
    }

    /// Returns when the procurement was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the procurement was last mutated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn validate_details(
    title: &str,
    description: &str,
    budget: Money,
    buyer_id: &BuyerId,
) -> Result<(), ProcurementError> {
    if title.trim().is_empty() {
        return Err(ProcurementError::TitleRequired);
    }
    if description.trim().is_empty() {
        return Err(ProcurementError::DescriptionRequired);
    }
    if budget.is_zero() || budget.is_negative() {
        return Err(ProcurementError::ZeroBudget);
    }
    if buyer_id.as_str().trim().is_empty() {
        return Err(ProcurementError::BuyerRequired);
    }
    Ok(())
}
