//! Query filters for store listings.

use domain::{BuyerId, Procurement, ProcurementStatus};

/// Filter for listing procurements.
#[derive(Debug, Clone, Default)]
pub struct ProcurementFilter {
    /// Restrict to a single status.
    pub status: Option<ProcurementStatus>,

    /// Restrict to one buyer.
    pub buyer_id: Option<BuyerId>,
}

impl ProcurementFilter {
    /// Creates an empty filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to a status.
    pub fn with_status(mut self, status: ProcurementStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts the filter to a buyer.
    pub fn with_buyer(mut self, buyer_id: BuyerId) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    /// Returns true if the procurement matches the filter.
    pub fn matches(&self, procurement: &Procurement) -> bool {
        if let Some(status) = self.status
            && procurement.status() != status
        {
            return false;
        }
        if let Some(ref buyer_id) = self.buyer_id
            && procurement.buyer_id() != buyer_id
        {
            return false;
        }
        true
    }
}
