//! Governance proposal model.
//!
//! # Invariants
//! - Status moves `Uninitialized -> Started -> Accepted | Contested`, and from
//!   there to `Rejected | Completed`; the contract is the source of truth.
//! - Votes are only accepted while a proposal is `Started`.

use serde::{Deserialize, Serialize};

/// Lifecycle state reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Uninitialized,
    Started,
    Accepted,
    Contested,
    Rejected,
    Completed,
}

impl ProposalStatus {
    pub fn accepts_votes(self) -> bool {
        self == Self::Started
    }
}

/// On-chain governance item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub title: String,
    /// Requested budget in the contract's smallest unit.
    pub budget: u64,
    /// Voting window as block numbers.
    pub voting_start: u64,
    pub voting_end: u64,
    #[serde(default)]
    pub votes_for: u64,
    #[serde(default)]
    pub votes_against: u64,
    pub status: ProposalStatus,
}

impl Proposal {
    pub fn total_votes(&self) -> u64 {
        self.votes_for.saturating_add(self.votes_against)
    }
}
