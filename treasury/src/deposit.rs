//! Deposit ledger
//!
//! Tracks, per account, the token units held by the engine and the part of
//! that balance pledged to individual proposals. For every account the sum
//! of its locks never exceeds its balance.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, TreasuryError};
use crate::ledger::TokenLedger;

/// One account's deposit and its active vote locks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deposit {
    pub balance: u64,
    /// proposal id -> locked weight
    pub locked: BTreeMap<u64, u64>,
}

impl Deposit {
    pub fn locked_total(&self) -> u64 {
        self.locked.values().sum()
    }

    pub fn available(&self) -> u64 {
        self.balance.saturating_sub(self.locked_total())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositLedger {
    accounts: HashMap<String, Deposit>,
}

impl DepositLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull `amount` tokens from `account` into `custodian` and credit them.
    /// Returns the account's new balance.
    pub fn deposit(
        &mut self,
        token: &dyn TokenLedger,
        custodian: &str,
        account: &str,
        amount: u64,
    ) -> Result<u64> {
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount(
                "deposit must be positive".to_string(),
            ));
        }

        let current = self.balance(account);
        let balance = current
            .checked_add(amount)
            .ok_or_else(|| TreasuryError::InvalidAmount(format!("deposit overflow for {}", account)))?;

        token
            .transfer_from(account, custodian, amount)
            .map_err(|e| TreasuryError::InsufficientTokenFunds(e.to_string()))?;

        self.accounts.entry(account.to_string()).or_default().balance = balance;
        Ok(balance)
    }

    /// Pledge `amount` of the account's available balance to `proposal_id`.
    /// Returns the account's total weight on that proposal.
    pub fn lock(&mut self, account: &str, proposal_id: u64, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount(
                "vote weight must be positive".to_string(),
            ));
        }

        let available = self.available(account);
        if amount > available {
            return Err(TreasuryError::InsufficientDeposit {
                requested: amount,
                available,
            });
        }

        // amount <= available <= balance, so the lock total cannot overflow
        let deposit = self.accounts.entry(account.to_string()).or_default();
        let weight = deposit.locked.entry(proposal_id).or_insert(0);
        *weight += amount;
        Ok(*weight)
    }

    /// Release the whole lock `account` holds on `proposal_id`
    pub fn unlock(&mut self, account: &str, proposal_id: u64) -> Result<u64> {
        self.accounts
            .get_mut(account)
            .and_then(|deposit| deposit.locked.remove(&proposal_id))
            .ok_or_else(|| TreasuryError::NoActiveVote {
                account: account.to_string(),
                proposal_id,
            })
    }

    pub fn available(&self, account: &str) -> u64 {
        self.accounts
            .get(account)
            .map(Deposit::available)
            .unwrap_or(0)
    }

    pub fn balance(&self, account: &str) -> u64 {
        self.accounts
            .get(account)
            .map(|deposit| deposit.balance)
            .unwrap_or(0)
    }

    pub fn locked(&self, account: &str, proposal_id: u64) -> Option<u64> {
        self.accounts
            .get(account)
            .and_then(|deposit| deposit.locked.get(&proposal_id))
            .copied()
    }

    /// Total weight locked on a proposal across all accounts
    pub fn locked_on(&self, proposal_id: u64) -> u64 {
        self.accounts
            .values()
            .filter_map(|deposit| deposit.locked.get(&proposal_id))
            .sum()
    }

    pub fn get(&self, account: &str) -> Option<&Deposit> {
        self.accounts.get(account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&String, &Deposit)> + '_ {
        self.accounts.iter()
    }

    /// Sum of every account balance
    pub fn total_deposited(&self) -> u64 {
        self.accounts.values().map(|deposit| deposit.balance).sum()
    }
}
