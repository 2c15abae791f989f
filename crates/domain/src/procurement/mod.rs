//! Procurement aggregate and bidding state machine.

mod aggregate;
mod bid;
mod ids;
mod state;

pub use aggregate::Procurement;
pub use bid::{Bid, BidStatus};
pub use ids::{BidId, BuyerId, VendorId};
pub use state::ProcurementStatus;

use thiserror::Error;

use crate::money::MoneyError;

/// Errors that can occur during procurement operations.
///
/// Each illegal transition names the precondition it requires.
#[derive(Debug, Error)]
pub enum ProcurementError {
    /// Title is required.
    #[error("title is required")]
    TitleRequired,

    /// Description is required.
    #[error("description is required")]
    DescriptionRequired,

    /// Budget must be greater than zero.
    #[error("budget is required and must be greater than zero")]
    ZeroBudget,

    /// Buyer is required.
    #[error("buyer is required")]
    BuyerRequired,

    /// Only draft procurements can be published.
    #[error("only draft procurements can be published")]
    PublishRequiresDraft,

    /// Publishing requires a deadline at least one day out.
    #[error("deadline must be at least one day in the future")]
    DeadlineTooSoon,

    /// Only published procurements can open bidding.
    #[error("only published procurements can open bidding")]
    OpenBiddingRequiresPublished,

    /// Only open bidding can be closed.
    #[error("only procurements with open bidding can be closed")]
    CloseRequiresOpenBidding,

    /// Only draft procurements can be updated.
    #[error("only draft procurements can be updated")]
    UpdateRequiresDraft,

    /// Bidding is not open.
    #[error("bidding is not open for this procurement")]
    BiddingNotOpen,

    /// The bidding deadline has passed.
    #[error("bidding deadline has passed")]
    DeadlinePassed,

    /// Bids must fit inside the budget.
    #[error("bid amount cannot exceed budget")]
    BidOverBudget,

    /// Bid amounts must be greater than zero.
    #[error("bid amount is required and must be greater than zero")]
    ZeroBidAmount,

    /// One submitted bid per vendor per procurement.
    #[error("vendor {vendor_id} has already submitted a bid")]
    DuplicateBid { vendor_id: VendorId },

    /// Awarding requires closed bidding.
    #[error("bidding must be closed before awarding")]
    AwardRequiresClosedBidding,

    /// The referenced bid does not exist.
    #[error("bid not found: {bid_id}")]
    BidNotFound { bid_id: BidId },

    /// Only submitted bids can be awarded.
    #[error("only submitted bids can be awarded")]
    BidNotSubmitted,

    /// Awarded procurements cannot be cancelled.
    #[error("cannot cancel an awarded procurement")]
    CancelAfterAward,

    /// Money comparison failed (bid currency differs from the budget).
    #[error(transparent)]
    Money(#[from] MoneyError),
}
