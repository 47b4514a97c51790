//! External collaborators consumed by the engine
//!
//! The engine never owns token or currency balances itself; it talks to a
//! `TokenLedger` for voting deposits, a `CurrencyLedger` for escrowed funds
//! and payouts, and a `MembershipRegistry` for the member gate. In-memory
//! implementations are provided for tests, local simulation and embedders
//! without a chain.
//!
//! Token units are `u64`. Currency is `u128` so that wei-scale amounts
//! (10^18 per whole unit) can accumulate in escrow.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Failure reported by a ledger collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: String,
        required: u128,
        available: u128,
    },

    #[error("Insufficient allowance from {owner} to {spender}: required {required}, available {available}")]
    InsufficientAllowance {
        owner: String,
        spender: String,
        required: u64,
        available: u64,
    },

    #[error("Payment rejected by {0}")]
    PaymentRejected(String),

    #[error("Balance overflow for {0}")]
    Overflow(String),
}

/// Fungible token used as voting weight
pub trait TokenLedger: Send + Sync {
    /// Move `amount` from `owner` to `to`, spending the allowance `owner` granted `to`
    fn transfer_from(&self, owner: &str, to: &str, amount: u64) -> Result<(), LedgerError>;

    fn balance_of(&self, account: &str) -> u64;

    fn total_supply(&self) -> u64;
}

/// Currency held in escrow and paid out to proposal recipients
pub trait CurrencyLedger: Send + Sync {
    /// Credit `custodian` with `amount` sent along with a proposal
    fn receive(&self, custodian: &str, amount: u128) -> Result<(), LedgerError>;

    /// Pay `amount` out of `custodian` to `to`
    fn transfer(&self, custodian: &str, to: &str, amount: u128) -> Result<(), LedgerError>;

    fn balance_of(&self, account: &str) -> u128;
}

/// Role registry holding the "member" capability
pub trait MembershipRegistry: Send + Sync {
    fn is_member(&self, account: &str) -> bool;
}

/// Serializable state of an `InMemoryTokenLedger`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenState {
    pub symbol: String,
    pub total_supply: u64,
    pub balances: HashMap<String, u64>,
    /// owner -> spender -> allowance
    pub allowances: HashMap<String, HashMap<String, u64>>,
}

/// ERC20-style token ledger kept in memory
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    state: RwLock<TokenState>,
}

impl InMemoryTokenLedger {
    pub fn new(symbol: &str) -> Self {
        Self {
            state: RwLock::new(TokenState {
                symbol: symbol.to_string(),
                ..TokenState::default()
            }),
        }
    }

    pub fn from_state(state: TokenState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn state(&self) -> TokenState {
        self.state.read().clone()
    }

    pub fn symbol(&self) -> String {
        self.state.read().symbol.clone()
    }

    /// Create new supply credited to `account`
    pub fn mint(&self, account: &str, amount: u64) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.to_string()))?;
        state.total_supply = supply;
        *state.balances.entry(account.to_string()).or_insert(0) += amount;
        Ok(())
    }

    /// Plain transfer by the owner of the funds
    pub fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        Self::move_balance(&mut state, from, to, amount)
    }

    pub fn approve(&self, owner: &str, spender: &str, amount: u64) {
        let mut state = self.state.write();
        state
            .allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    pub fn allowance(&self, owner: &str, spender: &str) -> u64 {
        let state = self.state.read();
        state
            .allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn move_balance(
        state: &mut TokenState,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from.to_string(),
                required: amount.into(),
                available: available.into(),
            });
        }
        state.balances.insert(from.to_string(), available - amount);
        *state.balances.entry(to.to_string()).or_insert(0) += amount;
        Ok(())
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn transfer_from(&self, owner: &str, to: &str, amount: u64) -> Result<(), LedgerError> {
        let mut state = self.state.write();

        let allowed = state
            .allowances
            .get(owner)
            .and_then(|spenders| spenders.get(to))
            .copied()
            .unwrap_or(0);
        if allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: owner.to_string(),
                spender: to.to_string(),
                required: amount,
                available: allowed,
            });
        }

        Self::move_balance(&mut state, owner, to, amount)?;

        if let Some(spenders) = state.allowances.get_mut(owner) {
            spenders.insert(to.to_string(), allowed - amount);
        }
        Ok(())
    }

    fn balance_of(&self, account: &str) -> u64 {
        self.state.read().balances.get(account).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u64 {
        self.state.read().total_supply
    }
}

/// Serializable state of an `InMemoryCurrencyLedger`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrencyState {
    pub balances: HashMap<String, u128>,
    /// Accounts that refuse incoming payments
    pub rejecting: HashSet<String>,
}

/// Currency ledger kept in memory
#[derive(Debug, Default)]
pub struct InMemoryCurrencyLedger {
    state: RwLock<CurrencyState>,
}

impl InMemoryCurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: CurrencyState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn state(&self) -> CurrencyState {
        self.state.read().clone()
    }

    /// Make `account` refuse every payment until `accept_payments` is called
    pub fn reject_payments(&self, account: &str) {
        self.state.write().rejecting.insert(account.to_string());
    }

    pub fn accept_payments(&self, account: &str) {
        self.state.write().rejecting.remove(account);
    }

    /// Sum of every balance
    pub fn total(&self) -> u128 {
        self.state.read().balances.values().sum()
    }

    fn credit(state: &mut CurrencyState, account: &str, amount: u128) -> Result<(), LedgerError> {
        let current = state.balances.get(account).copied().unwrap_or(0);
        let balance = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(account.to_string()))?;
        state.balances.insert(account.to_string(), balance);
        Ok(())
    }
}

impl CurrencyLedger for InMemoryCurrencyLedger {
    fn receive(&self, custodian: &str, amount: u128) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        Self::credit(&mut state, custodian, amount)
    }

    fn transfer(&self, custodian: &str, to: &str, amount: u128) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        if state.rejecting.contains(to) {
            return Err(LedgerError::PaymentRejected(to.to_string()));
        }

        let available = state.balances.get(custodian).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: custodian.to_string(),
                required: amount,
                available,
            });
        }
        if custodian == to {
            return Ok(());
        }
        let credited = state.balances.get(to).copied().unwrap_or(0);
        if credited.checked_add(amount).is_none() {
            return Err(LedgerError::Overflow(to.to_string()));
        }

        state.balances.insert(custodian.to_string(), available - amount);
        Self::credit(&mut state, to, amount)
    }

    fn balance_of(&self, account: &str) -> u128 {
        self.state.read().balances.get(account).copied().unwrap_or(0)
    }
}

/// Grant/revoke registry for the member role
#[derive(Debug, Default)]
pub struct RoleRegistry {
    members: RwLock<HashSet<String>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_members<I: IntoIterator<Item = String>>(members: I) -> Self {
        Self {
            members: RwLock::new(members.into_iter().collect()),
        }
    }

    /// Returns false if the account already held the role
    pub fn grant(&self, account: &str) -> bool {
        self.members.write().insert(account.to_string())
    }

    /// Returns false if the account did not hold the role
    pub fn revoke(&self, account: &str) -> bool {
        self.members.write().remove(account)
    }

    pub fn members(&self) -> Vec<String> {
        let mut members: Vec<String> = self.members.read().iter().cloned().collect();
        members.sort();
        members
    }
}

impl MembershipRegistry for RoleRegistry {
    fn is_member(&self, account: &str) -> bool {
        self.members.read().contains(account)
    }
}
