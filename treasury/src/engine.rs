//! Governance engine
//!
//! Orchestrates proposal creation, voting, unvoting and execution on top of
//! the `ProposalStore`, the `DepositLedger` and the `EscrowPool`. Every public
//! operation checks all of its preconditions before touching state, so a
//! returned error never leaves a partial commit behind.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::TreasuryConfig;
use crate::deposit::DepositLedger;
use crate::error::{Result, TreasuryError};
use crate::events::{EventLog, GovernanceEvent};
use crate::ledger::{CurrencyLedger, MembershipRegistry, TokenLedger};
use crate::pool::EscrowPool;
use crate::proposal::{Proposal, ProposalParams, ProposalState, ProposalStore};

/// Handles to everything the engine consumes but does not own
#[derive(Clone)]
pub struct Collaborators {
    pub token: Arc<dyn TokenLedger>,
    pub currency: Arc<dyn CurrencyLedger>,
    pub members: Arc<dyn MembershipRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// Serializable engine state, without collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub config: TreasuryConfig,
    pub total_voting_supply: u64,
    pub proposals: ProposalStore,
    pub deposits: DepositLedger,
    pub escrow: EscrowPool,
    pub events: EventLog,
}

pub struct GovernanceEngine {
    config: TreasuryConfig,
    total_voting_supply: u64,
    proposals: ProposalStore,
    deposits: DepositLedger,
    escrow: EscrowPool,
    events: EventLog,
    collaborators: Collaborators,
}

impl GovernanceEngine {
    /// Build a fresh engine. The quorum base is taken from the config or,
    /// failing that, from the token's total supply right now.
    pub fn new(config: TreasuryConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let total_voting_supply = config
            .total_voting_supply
            .unwrap_or_else(|| collaborators.token.total_supply());

        info!(
            "Treasury engine initialised: token {}, min debating period {}s, quorum {}/{} of {}",
            config.token,
            config.min_debating_period,
            config.quorum_numerator,
            crate::config::QUORUM_DENOMINATOR,
            total_voting_supply
        );

        Ok(Self {
            proposals: ProposalStore::new(config.min_debating_period),
            deposits: DepositLedger::new(),
            escrow: EscrowPool::new(),
            events: EventLog::new(),
            total_voting_supply,
            config,
            collaborators,
        })
    }

    pub fn from_snapshot(snapshot: EngineSnapshot, collaborators: Collaborators) -> Result<Self> {
        snapshot.config.validate()?;
        debug!(
            "Restoring treasury engine with {} proposals",
            snapshot.proposals.len()
        );
        Ok(Self {
            config: snapshot.config,
            total_voting_supply: snapshot.total_voting_supply,
            proposals: snapshot.proposals,
            deposits: snapshot.deposits,
            escrow: snapshot.escrow,
            events: snapshot.events,
            collaborators,
        })
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            config: self.config.clone(),
            total_voting_supply: self.total_voting_supply,
            proposals: self.proposals.clone(),
            deposits: self.deposits.clone(),
            escrow: self.escrow.clone(),
            events: self.events.clone(),
        }
    }

    /// Create a proposal backed by `funded_amount` of currency. The funds
    /// arrive with the call and are credited to the engine account.
    pub fn create_proposal(
        &mut self,
        params: ProposalParams,
        funded_amount: u128,
    ) -> Result<(u64, GovernanceEvent)> {
        let now = self.now();
        self.proposals.check_create(&params, funded_amount)?;

        let id = self.proposals.next_id();
        let amount = params.amount;
        self.escrow.check_fund(id, amount, funded_amount)?;
        self.collaborators
            .currency
            .receive(&self.config.engine_account, funded_amount)
            .map_err(|e| TreasuryError::CurrencyTransferFailed(e.to_string()))?;
        debug!(
            "Escrow received {} for proposal {} into {}",
            funded_amount, id, self.config.engine_account
        );

        self.escrow.fund(id, amount, funded_amount, now)?;
        let (id, event) = self.proposals.create(params, funded_amount, now)?;

        if funded_amount > amount {
            warn!(
                "Proposal {} over-funded by {}; excess retained as surplus",
                id,
                funded_amount - amount
            );
        }
        info!("Proposal created: {}", event);
        self.events.push(event.clone());
        Ok((id, event))
    }

    /// Move `amount` tokens from `account` into the engine's custody
    pub fn deposit(&mut self, account: &str, amount: u64) -> Result<u64> {
        self.ensure_member(account)?;

        let balance = self.deposits.deposit(
            self.collaborators.token.as_ref(),
            &self.config.engine_account,
            account,
            amount,
        )?;

        info!("Deposit: {} added {} (balance {})", account, amount, balance);
        Ok(balance)
    }

    /// Lock `amount` of the account's available deposit in favour of a proposal
    pub fn vote(&mut self, account: &str, proposal_id: u64, amount: u64) -> Result<GovernanceEvent> {
        self.ensure_member(account)?;
        let now = self.now();

        let proposal = self.proposals.get(proposal_id)?;
        if !proposal.is_open(now) {
            return Err(TreasuryError::VotingClosed(proposal_id));
        }
        let available = self.deposits.available(account);
        if amount > available {
            return Err(TreasuryError::InsufficientDeposit {
                requested: amount,
                available,
            });
        }
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount(
                "vote weight must be positive".to_string(),
            ));
        }
        if proposal.votes.checked_add(amount).is_none() {
            return Err(TreasuryError::InvalidAmount(format!(
                "vote total overflow on proposal {}",
                proposal_id
            )));
        }

        let weight = self.deposits.lock(account, proposal_id, amount)?;
        let votes = self.proposals.add_votes(proposal_id, amount)?;

        let event = GovernanceEvent::Voted {
            proposal_id,
            amount,
            voter: account.to_string(),
        };
        info!("{} (weight {}, proposal total {})", event, weight, votes);
        self.events.push(event.clone());
        Ok(event)
    }

    /// Withdraw the account's entire vote from a proposal
    pub fn unvote(&mut self, account: &str, proposal_id: u64) -> Result<GovernanceEvent> {
        self.ensure_member(account)?;
        let now = self.now();

        let weight = self
            .deposits
            .locked(account, proposal_id)
            .ok_or_else(|| TreasuryError::NoActiveVote {
                account: account.to_string(),
                proposal_id,
            })?;
        let proposal = self.proposals.get(proposal_id)?;
        if !proposal.is_open(now) {
            return Err(TreasuryError::VotingClosed(proposal_id));
        }
        if proposal.votes < weight {
            return Err(TreasuryError::VoteWeightUnderflow {
                proposal_id,
                votes: proposal.votes,
                delta: weight,
            });
        }

        let released = self.deposits.unlock(account, proposal_id)?;
        let votes = self.proposals.remove_votes(proposal_id, released)?;

        let event = GovernanceEvent::Unvoted {
            proposal_id,
            amount: released,
            voter: account.to_string(),
        };
        info!("{} (proposal total {})", event, votes);
        self.events.push(event.clone());
        Ok(event)
    }

    /// Pay out a closed proposal that reached quorum. Anyone may call this.
    pub fn execute_proposal(&mut self, proposal_id: u64) -> Result<GovernanceEvent> {
        let now = self.now();

        let proposal = self.proposals.get(proposal_id)?;
        if proposal.executed {
            return Err(TreasuryError::AlreadyExecuted(proposal_id));
        }
        if proposal.is_open(now) {
            return Err(TreasuryError::VotingStillOpen(proposal_id));
        }
        if !self
            .config
            .quorum_reached(proposal.votes, self.total_voting_supply)
        {
            let required = self.config.required_votes(self.total_voting_supply);
            warn!(
                "Proposal {} closed without quorum: {} of {} votes",
                proposal_id, proposal.votes, required
            );
            return Err(TreasuryError::QuorumNotReached {
                votes: proposal.votes,
                required,
            });
        }
        if self.escrow.earmarked(proposal_id) != Some(proposal.amount) {
            return Err(TreasuryError::InvalidAmount(format!(
                "escrow for proposal {} does not match its amount",
                proposal_id
            )));
        }
        let recipient = proposal.recipient.clone();
        let amount = proposal.amount;

        self.proposals.mark_executed(proposal_id)?;

        if let Err(e) = self
            .collaborators
            .currency
            .transfer(&self.config.engine_account, &recipient, amount)
        {
            warn!(
                "Payout of proposal {} to {} failed: {}",
                proposal_id, recipient, e
            );
            self.proposals.revert_execution(proposal_id)?;
            return Err(TreasuryError::CurrencyTransferFailed(e.to_string()));
        }
        self.escrow.release(proposal_id, now)?;

        let event = GovernanceEvent::ProposalExecuted {
            id: proposal_id,
            amount,
            recipient,
        };
        info!("Proposal executed: {}", event);
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn proposal(&self, proposal_id: u64) -> Result<&Proposal> {
        self.proposals.get(proposal_id)
    }

    pub fn proposals(&self) -> Vec<&Proposal> {
        self.proposals.iter().collect()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    pub fn proposal_state(&self, proposal_id: u64) -> Result<ProposalState> {
        Ok(self.proposals.get(proposal_id)?.state(self.now()))
    }

    pub fn is_open(&self, proposal_id: u64) -> Result<bool> {
        self.proposals.is_open(proposal_id, self.now())
    }

    pub fn quorum_reached(&self, proposal_id: u64) -> Result<bool> {
        let proposal = self.proposals.get(proposal_id)?;
        Ok(self
            .config
            .quorum_reached(proposal.votes, self.total_voting_supply))
    }

    pub fn deposit_balance(&self, account: &str) -> u64 {
        self.deposits.balance(account)
    }

    pub fn available(&self, account: &str) -> u64 {
        self.deposits.available(account)
    }

    pub fn locked_weight(&self, account: &str, proposal_id: u64) -> Option<u64> {
        self.deposits.locked(account, proposal_id)
    }

    pub fn deposits(&self) -> &DepositLedger {
        &self.deposits
    }

    pub fn escrow(&self) -> &EscrowPool {
        &self.escrow
    }

    pub fn events(&self) -> &[GovernanceEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        self.events.drain()
    }

    pub fn total_voting_supply(&self) -> u64 {
        self.total_voting_supply
    }

    pub fn config(&self) -> &TreasuryConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.collaborators.clock.now()
    }

    fn ensure_member(&self, account: &str) -> Result<()> {
        if self.config.members_only && !self.collaborators.members.is_member(account) {
            return Err(TreasuryError::NotMember(account.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ledger::{InMemoryCurrencyLedger, InMemoryTokenLedger, RoleRegistry};

    const DAY: u64 = 86_400;

    struct Fixture {
        engine: GovernanceEngine,
        token: Arc<InMemoryTokenLedger>,
        currency: Arc<InMemoryCurrencyLedger>,
        members: Arc<RoleRegistry>,
        clock: Arc<ManualClock>,
    }

    fn setup() -> Fixture {
        let token = Arc::new(InMemoryTokenLedger::new("TKA"));
        let currency = Arc::new(InMemoryCurrencyLedger::new());
        let members = Arc::new(RoleRegistry::new());
        let clock = Arc::new(ManualClock::new(1_000));

        token.mint("admin", 5_000).unwrap();
        for user in ["user1", "user2"] {
            token.mint(user, 1_000).unwrap();
            token.approve(user, "treasury", 1_000);
            members.grant(user);
        }

        let engine = GovernanceEngine::new(
            TreasuryConfig::new(DAY, "TKA", 800),
            Collaborators {
                token: token.clone(),
                currency: currency.clone(),
                members: members.clone(),
                clock: clock.clone(),
            },
        )
        .unwrap();

        Fixture {
            engine,
            token,
            currency,
            members,
            clock,
        }
    }

    fn create(engine: &mut GovernanceEngine) -> u64 {
        engine
            .create_proposal(ProposalParams::new("recipient", 10, "proposal", DAY), 10)
            .unwrap()
            .0
    }

    #[test]
    fn test_supply_snapshot() {
        let f = setup();
        assert_eq!(f.engine.total_voting_supply(), 7_000);
        f.token.mint("admin", 1_000).unwrap();
        assert_eq!(f.engine.total_voting_supply(), 7_000);
    }

    #[test]
    fn test_create_funds_escrow() {
        let mut f = setup();
        let id = create(&mut f.engine);
        assert_eq!(f.engine.escrow().earmarked(id), Some(10));
        assert_eq!(f.currency.balance_of("treasury"), 10);
        assert_eq!(f.engine.events().len(), 1);
    }

    #[test]
    fn test_currency_conserved_through_execution() {
        let mut f = setup();
        f.engine
            .create_proposal(ProposalParams::new("recipient", 10, "proposal", DAY), 14)
            .unwrap();
        assert_eq!(f.currency.balance_of("treasury"), 14);
        assert_eq!(f.currency.total(), 14);

        f.engine.deposit("user1", 1_000).unwrap();
        f.engine.vote("user1", 0, 1_000).unwrap();
        f.clock.advance(DAY);
        f.engine.execute_proposal(0).unwrap();

        assert_eq!(f.currency.balance_of("recipient"), 10);
        assert_eq!(f.currency.balance_of("treasury"), 4);
        assert_eq!(f.currency.total(), 14);
        assert_eq!(f.engine.escrow().balance(), f.currency.balance_of("treasury"));
    }

    #[test]
    fn test_payout_fails_without_custody() {
        let mut f = setup();
        create(&mut f.engine);
        f.engine.deposit("user1", 1_000).unwrap();
        f.engine.vote("user1", 0, 1_000).unwrap();
        f.clock.advance(DAY);

        // custody drained behind the engine's back
        f.currency.transfer("treasury", "elsewhere", 10).unwrap();
        assert!(matches!(
            f.engine.execute_proposal(0),
            Err(TreasuryError::CurrencyTransferFailed(_))
        ));
        assert!(!f.engine.proposal(0).unwrap().executed);
        assert_eq!(f.currency.balance_of("recipient"), 0);
    }

    #[test]
    fn test_vote_window_edges() {
        let mut f = setup();
        create(&mut f.engine);
        f.engine.deposit("user1", 100).unwrap();

        f.clock.advance(DAY - 1);
        f.engine.vote("user1", 0, 40).unwrap();
        f.engine.unvote("user1", 0).unwrap();
        f.engine.vote("user1", 0, 60).unwrap();

        f.clock.advance(1);
        assert_eq!(
            f.engine.unvote("user1", 0),
            Err(TreasuryError::VotingClosed(0))
        );
        assert_eq!(
            f.engine.vote("user1", 0, 10),
            Err(TreasuryError::VotingClosed(0))
        );
        assert_eq!(f.engine.proposal(0).unwrap().votes, 60);
        assert_eq!(f.engine.locked_weight("user1", 0), Some(60));
    }

    #[test]
    fn test_rejected_create_leaves_no_trace() {
        let mut f = setup();
        let result = f
            .engine
            .create_proposal(ProposalParams::new("recipient", 10, "proposal", DAY), 9);
        assert!(matches!(result, Err(TreasuryError::InsufficientFunding { .. })));
        assert_eq!(f.engine.proposal_count(), 0);
        assert_eq!(f.engine.escrow().balance(), 0);
        assert_eq!(f.currency.total(), 0);
        assert!(f.engine.events().is_empty());
    }

    #[test]
    fn test_membership_gate() {
        let mut f = setup();
        create(&mut f.engine);
        f.token.mint("outsider", 100).unwrap();
        f.token.approve("outsider", "treasury", 100);

        assert!(matches!(
            f.engine.deposit("outsider", 100),
            Err(TreasuryError::NotMember(_))
        ));

        f.members.grant("outsider");
        f.engine.deposit("outsider", 100).unwrap();
        f.members.revoke("outsider");
        assert!(matches!(
            f.engine.vote("outsider", 0, 50),
            Err(TreasuryError::NotMember(_))
        ));
    }

    #[test]
    fn test_gate_disabled() {
        let token = Arc::new(InMemoryTokenLedger::new("TKA"));
        token.mint("anyone", 100).unwrap();
        token.approve("anyone", "treasury", 100);
        let mut config = TreasuryConfig::default();
        config.members_only = false;

        let mut engine = GovernanceEngine::new(
            config,
            Collaborators {
                token,
                currency: Arc::new(InMemoryCurrencyLedger::new()),
                members: Arc::new(RoleRegistry::new()),
                clock: Arc::new(ManualClock::new(0)),
            },
        )
        .unwrap();
        assert_eq!(engine.deposit("anyone", 100).unwrap(), 100);
    }

    #[test]
    fn test_vote_checks_in_order() {
        let mut f = setup();
        assert!(matches!(
            f.engine.vote("user1", 0, 10),
            Err(TreasuryError::UnknownProposal(0))
        ));

        create(&mut f.engine);
        assert!(matches!(
            f.engine.vote("user1", 0, 10),
            Err(TreasuryError::InsufficientDeposit { available: 0, .. })
        ));

        f.engine.deposit("user1", 100).unwrap();
        f.clock.advance(DAY);
        assert!(matches!(
            f.engine.vote("user1", 0, 500),
            Err(TreasuryError::VotingClosed(0))
        ));
    }

    #[test]
    fn test_zero_vote_rejected() {
        let mut f = setup();
        create(&mut f.engine);
        f.engine.deposit("user1", 100).unwrap();
        assert!(matches!(
            f.engine.vote("user1", 0, 0),
            Err(TreasuryError::InvalidAmount(_))
        ));
        assert_eq!(f.engine.locked_weight("user1", 0), None);
    }

    #[test]
    fn test_unvote_unknown_proposal() {
        let mut f = setup();
        assert!(matches!(
            f.engine.unvote("user1", 4),
            Err(TreasuryError::NoActiveVote { proposal_id: 4, .. })
        ));
    }

    #[test]
    fn test_payout_failure_keeps_proposal_pending() {
        let mut f = setup();
        create(&mut f.engine);
        f.engine.deposit("user1", 1_000).unwrap();
        f.engine.vote("user1", 0, 1_000).unwrap();
        f.clock.advance(DAY);

        f.currency.reject_payments("recipient");
        assert!(matches!(
            f.engine.execute_proposal(0),
            Err(TreasuryError::CurrencyTransferFailed(_))
        ));
        assert!(!f.engine.proposal(0).unwrap().executed);
        assert_eq!(f.engine.escrow().earmarked(0), Some(10));
        assert_eq!(f.engine.proposal_state(0).unwrap(), ProposalState::ClosedPending);

        f.currency.accept_payments("recipient");
        f.engine.execute_proposal(0).unwrap();
        assert_eq!(f.currency.balance_of("recipient"), 10);
        assert_eq!(f.engine.escrow().balance(), 0);
        assert_eq!(f.engine.proposal_state(0).unwrap(), ProposalState::Executed);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut f = setup();
        create(&mut f.engine);
        f.engine.deposit("user1", 100).unwrap();
        f.engine.vote("user1", 0, 60).unwrap();

        let snapshot = f.engine.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: EngineSnapshot = serde_json::from_str(&json).unwrap();

        let engine = GovernanceEngine::from_snapshot(
            restored,
            Collaborators {
                token: f.token.clone(),
                currency: f.currency.clone(),
                members: f.members.clone(),
                clock: f.clock.clone(),
            },
        )
        .unwrap();
        assert_eq!(engine.proposal(0).unwrap().votes, 60);
        assert_eq!(engine.available("user1"), 40);
        assert_eq!(engine.locked_weight("user1", 0), Some(60));
        assert_eq!(engine.events().len(), 2);
        assert_eq!(engine.total_voting_supply(), 7_000);
    }
}
