//! Bid entity, owned by its procurement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::ids::{BidId, VendorId};
use super::ProcurementError;

/// Lifecycle of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidStatus {
    /// The bid is live and may be accepted or rejected.
    Submitted,
    /// The bid won the award.
    Accepted,
    /// The bid lost, or its procurement was cancelled.
    Rejected,
}

impl BidStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Submitted => "Submitted",
            BidStatus::Accepted => "Accepted",
            BidStatus::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A vendor's bid on a procurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    id: BidId,
    vendor_id: VendorId,
    amount: Money,
    submitted_at: DateTime<Utc>,
    status: BidStatus,
    notes: Option<String>,
}

impl Bid {
    /// Creates a submitted bid. The amount must be greater than zero.
    pub(super) fn new(
        vendor_id: VendorId,
        amount: Money,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ProcurementError> {
        if amount.is_zero() || amount.is_negative() {
            return Err(ProcurementError::ZeroBidAmount);
        }
        Ok(Self {
            id: BidId::new(),
            vendor_id,
            amount,
            submitted_at: now,
            status: BidStatus::Submitted,
            notes,
        })
    }

    pub(super) fn accept(&mut self) {
        self.status = BidStatus::Accepted;
    }

    pub(super) fn reject(&mut self) {
        self.status = BidStatus::Rejected;
    }

    /// Returns the bid ID.
    pub fn id(&self) -> BidId {
        self.id
    }

    /// Returns the bidding vendor.
    pub fn vendor_id(&self) -> &VendorId {
        &self.vendor_id
    }

    /// Returns the bid amount.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Returns when the bid was submitted.
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Returns the bid status.
    pub fn status(&self) -> BidStatus {
        self.status
    }

    /// Returns the optional vendor notes.
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}
