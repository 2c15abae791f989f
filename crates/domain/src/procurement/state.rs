//! Procurement state machine.

use serde::{Deserialize, Serialize};

/// The state of a procurement in its lifecycle.
///
/// State transitions:
/// ```text
/// Draft ──► Published ──► BiddingOpen ──► BiddingClosed ──► Awarded
///   │           │             │                │
///   └───────────┴─────────────┴────────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProcurementStatus {
    /// Procurement is being drafted and can still be edited.
    #[default]
    Draft,

    /// Procurement is visible to vendors but bidding has not opened.
    Published,

    /// Vendors may submit bids.
    BiddingOpen,

    /// Bidding is closed, awaiting award.
    BiddingClosed,

    /// A winning bid has been selected (terminal state).
    Awarded,

    /// Procurement was cancelled (terminal state).
    Cancelled,
}

impl ProcurementStatus {
    /// Returns true if the procurement can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        !matches!(self, ProcurementStatus::Awarded)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcurementStatus::Awarded | ProcurementStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementStatus::Draft => "Draft",
            ProcurementStatus::Published => "Published",
            ProcurementStatus::BiddingOpen => "BiddingOpen",
            ProcurementStatus::BiddingClosed => "BiddingClosed",
            ProcurementStatus::Awarded => "Awarded",
            ProcurementStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ProcurementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProcurementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(ProcurementStatus::Draft),
            "Published" => Ok(ProcurementStatus::Published),
            "BiddingOpen" => Ok(ProcurementStatus::BiddingOpen),
            "BiddingClosed" => Ok(ProcurementStatus::BiddingClosed),
            "Awarded" => Ok(ProcurementStatus::Awarded),
            "Cancelled" => Ok(ProcurementStatus::Cancelled),
            other => Err(format!("unknown procurement status: {other}")),
        }
    }
}
