//! Token-weighted Treasury Governance
//!
//! Members lock a fungible token as voting weight, propose transfers of
//! escrowed currency to a recipient, and vote during a fixed debating window.
//! A proposal is executed only if its votes reach the quorum of the total
//! voting supply before the window closes.

pub mod clock;
pub mod config;
pub mod deposit;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod pool;
pub mod proposal;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    TreasuryConfig,
    DEFAULT_MIN_DEBATING_PERIOD,
    DEFAULT_QUORUM_NUMERATOR,
    QUORUM_DENOMINATOR,
};
pub use deposit::{Deposit, DepositLedger};
pub use engine::{Collaborators, EngineSnapshot, GovernanceEngine};
pub use error::{Result, TreasuryError};
pub use events::{EventLog, GovernanceEvent};
pub use ledger::{
    CurrencyLedger,
    CurrencyState,
    InMemoryCurrencyLedger,
    InMemoryTokenLedger,
    LedgerError,
    MembershipRegistry,
    RoleRegistry,
    TokenLedger,
    TokenState,
};
pub use pool::{EscrowKind, EscrowPool, EscrowStats, EscrowTransaction};
pub use proposal::{Proposal, ProposalParams, ProposalState, ProposalStore};
pub use service::TreasuryService;
