//! Treasury proposals and their store
//!
//! A proposal is open for voting in `[created_at, created_at + debating_period)`.
//! After that instant its vote total is frozen and it can be executed once,
//! provided the quorum was reached.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreasuryError};
use crate::events::GovernanceEvent;

/// Lifecycle state derived from time and the executed flag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProposalState {
    /// Accepting votes and unvotes
    Open,
    /// Votes frozen, waiting for execution
    ClosedPending,
    /// Funds sent. Terminal state.
    Executed,
}

/// A transfer of escrowed currency awaiting a quorum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    pub id: u64,
    pub recipient: String,
    /// Currency units (wei scale)
    pub amount: u128,
    pub description: String,
    pub created_at: u64,
    pub debating_period: u64,
    pub votes: u64,
    pub executed: bool,
}

/// Parameters for creating a new proposal
#[derive(Debug, Clone)]
pub struct ProposalParams {
    pub recipient: String,
    pub amount: u128,
    pub description: String,
    pub debating_period: u64,
}

impl ProposalParams {
    pub fn new(recipient: &str, amount: u128, description: &str, debating_period: u64) -> Self {
        Self {
            recipient: recipient.to_string(),
            amount,
            description: description.to_string(),
            debating_period,
        }
    }
}

impl Proposal {
    pub fn new(id: u64, params: ProposalParams, created_at: u64) -> Self {
        Self {
            id,
            recipient: params.recipient,
            amount: params.amount,
            description: params.description,
            created_at,
            debating_period: params.debating_period,
            votes: 0,
            executed: false,
        }
    }

    /// First instant at which voting is closed
    pub fn deadline(&self) -> u64 {
        self.created_at.saturating_add(self.debating_period)
    }

    pub fn is_open(&self, now: u64) -> bool {
        now < self.deadline()
    }

    pub fn state(&self, now: u64) -> ProposalState {
        if self.executed {
            ProposalState::Executed
        } else if self.is_open(now) {
            ProposalState::Open
        } else {
            ProposalState::ClosedPending
        }
    }
}

/// Proposals indexed by creation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalStore {
    proposals: Vec<Proposal>,
    min_debating_period: u64,
}

impl ProposalStore {
    pub fn new(min_debating_period: u64) -> Self {
        Self {
            proposals: Vec::new(),
            min_debating_period,
        }
    }

    pub fn min_debating_period(&self) -> u64 {
        self.min_debating_period
    }

    /// Id the next proposal will receive
    pub fn next_id(&self) -> u64 {
        self.proposals.len() as u64
    }

    /// Validate and store a new proposal funded with `funded_amount`
    pub fn create(
        &mut self,
        params: ProposalParams,
        funded_amount: u128,
        now: u64,
    ) -> Result<(u64, GovernanceEvent)> {
        self.check_create(&params, funded_amount)?;

        let id = self.next_id();
        let proposal = Proposal::new(id, params, now);
        let event = GovernanceEvent::ProposalCreated {
            id,
            amount: proposal.amount,
            recipient: proposal.recipient.clone(),
        };
        self.proposals.push(proposal);
        Ok((id, event))
    }

    /// Preconditions of `create`, without side effects
    pub fn check_create(&self, params: &ProposalParams, funded_amount: u128) -> Result<()> {
        if funded_amount < params.amount {
            return Err(TreasuryError::InsufficientFunding {
                required: params.amount,
                provided: funded_amount,
            });
        }
        if params.debating_period < self.min_debating_period {
            return Err(TreasuryError::PeriodTooShort {
                minimum: self.min_debating_period,
                provided: params.debating_period,
            });
        }
        Ok(())
    }

    pub fn get(&self, id: u64) -> Result<&Proposal> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.proposals.get(index))
            .ok_or(TreasuryError::UnknownProposal(id))
    }

    fn get_mut(&mut self, id: u64) -> Result<&mut Proposal> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.proposals.get_mut(index))
            .ok_or(TreasuryError::UnknownProposal(id))
    }

    pub fn is_open(&self, id: u64, now: u64) -> Result<bool> {
        Ok(self.get(id)?.is_open(now))
    }

    /// Returns the new vote total
    pub fn add_votes(&mut self, id: u64, delta: u64) -> Result<u64> {
        let proposal = self.get_mut(id)?;
        proposal.votes = proposal.votes.checked_add(delta).ok_or_else(|| {
            TreasuryError::InvalidAmount(format!("vote total overflow on proposal {}", id))
        })?;
        Ok(proposal.votes)
    }

    /// Returns the new vote total. Never lets the total go below zero.
    pub fn remove_votes(&mut self, id: u64, delta: u64) -> Result<u64> {
        let proposal = self.get_mut(id)?;
        proposal.votes = proposal
            .votes
            .checked_sub(delta)
            .ok_or(TreasuryError::VoteWeightUnderflow {
                proposal_id: id,
                votes: proposal.votes,
                delta,
            })?;
        Ok(proposal.votes)
    }

    pub fn mark_executed(&mut self, id: u64) -> Result<()> {
        let proposal = self.get_mut(id)?;
        if proposal.executed {
            return Err(TreasuryError::AlreadyExecuted(id));
        }
        proposal.executed = true;
        Ok(())
    }

    /// Undo `mark_executed` when the payout that followed it failed
    pub(crate) fn revert_execution(&mut self, id: u64) -> Result<()> {
        self.get_mut(id)?.executed = false;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Proposal> + '_ {
        self.proposals.iter()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Proposals in a given state at `now`
    pub fn by_state(&self, state: ProposalState, now: u64) -> Vec<&Proposal> {
        self.proposals
            .iter()
            .filter(|p| p.state(now) == state)
            .collect()
    }
}
