//! Governance events
//!
//! Every committed state transition produces exactly one event. The engine
//! returns it to the caller and appends it to its `EventLog`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable record of a committed transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceEvent {
    ProposalCreated {
        id: u64,
        amount: u128,
        recipient: String,
    },
    Voted {
        proposal_id: u64,
        amount: u64,
        voter: String,
    },
    Unvoted {
        proposal_id: u64,
        amount: u64,
        voter: String,
    },
    ProposalExecuted {
        id: u64,
        amount: u128,
        recipient: String,
    },
}

impl GovernanceEvent {
    /// Proposal the event refers to
    pub fn proposal_id(&self) -> u64 {
        match self {
            GovernanceEvent::ProposalCreated { id, .. } => *id,
            GovernanceEvent::Voted { proposal_id, .. } => *proposal_id,
            GovernanceEvent::Unvoted { proposal_id, .. } => *proposal_id,
            GovernanceEvent::ProposalExecuted { id, .. } => *id,
        }
    }
}

impl fmt::Display for GovernanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovernanceEvent::ProposalCreated {
                id,
                amount,
                recipient,
            } => write!(f, "ProposalCreated({}, {}, {})", id, amount, recipient),
            GovernanceEvent::Voted {
                proposal_id,
                amount,
                voter,
            } => write!(f, "Voted({}, {}, {})", proposal_id, amount, voter),
            GovernanceEvent::Unvoted {
                proposal_id,
                amount,
                voter,
            } => write!(f, "Unvoted({}, {}, {})", proposal_id, amount, voter),
            GovernanceEvent::ProposalExecuted {
                id,
                amount,
                recipient,
            } => write!(f, "ProposalExecuted({}, {}, {})", id, amount, recipient),
        }
    }
}

/// Append-only log of emitted events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<GovernanceEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GovernanceEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[GovernanceEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&GovernanceEvent> {
        self.events.last()
    }

    /// Take every event recorded so far, leaving the log empty
    pub fn drain(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events touching a single proposal, in emission order
    pub fn for_proposal(&self, proposal_id: u64) -> Vec<&GovernanceEvent> {
        self.events
            .iter()
            .filter(|e| e.proposal_id() == proposal_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
