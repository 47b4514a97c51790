//! Treasury error types

use thiserror::Error;

/// Governance engine errors
///
/// Every variant is a synchronous rejection of the call that produced it.
/// Nothing has been committed when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreasuryError {
    #[error("not enough ether")]
    InsufficientFunding { required: u128, provided: u128 },

    #[error("too short debating period")]
    PeriodTooShort { minimum: u64, provided: u64 },

    #[error("Proposal not found: {0}")]
    UnknownProposal(u64),

    #[error("vote is over")]
    VotingClosed(u64),

    #[error("Voting is still open for proposal {0}")]
    VotingStillOpen(u64),

    #[error("not enough deposit")]
    InsufficientDeposit { requested: u64, available: u64 },

    #[error("has not voted")]
    NoActiveVote { account: String, proposal_id: u64 },

    #[error("Proposal already executed: {0}")]
    AlreadyExecuted(u64),

    #[error("Quorum not reached: {votes} votes, {required} required")]
    QuorumNotReached { votes: u64, required: u64 },

    #[error("Insufficient token funds: {0}")]
    InsufficientTokenFunds(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Not a member: {0}")]
    NotMember(String),

    #[error("Currency transfer failed: {0}")]
    CurrencyTransferFailed(String),

    #[error("Vote weight underflow on proposal {proposal_id}: removing {delta} from {votes}")]
    VoteWeightUnderflow { proposal_id: u64, votes: u64, delta: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for TreasuryError {
    fn from(err: std::io::Error) -> Self {
        TreasuryError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TreasuryError {
    fn from(err: serde_json::Error) -> Self {
        TreasuryError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TreasuryError>;
