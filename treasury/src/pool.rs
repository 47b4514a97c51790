//! Escrow pool
//!
//! Currency the engine holds on behalf of proposals. Each proposal's amount
//! is earmarked from creation until execution. Funding above the requested
//! amount is kept as unallocated surplus and is never paid out.
//!
//! Invariant: `balance == sum(earmarks) + surplus`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TreasuryError};

/// Kind of escrow movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EscrowKind {
    /// Earmarked for a proposal at creation
    Funded,
    /// Excess funding retained by the engine
    Surplus,
    /// Paid out to a proposal's recipient
    Released,
}

/// Audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowTransaction {
    pub kind: EscrowKind,
    pub proposal_id: u64,
    pub amount: u128,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowStats {
    pub balance: u128,
    pub earmarked: u128,
    pub surplus: u128,
    pub total_released: u128,
    pub proposals_funded: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowPool {
    balance: u128,
    earmarks: BTreeMap<u64, u128>,
    surplus: u128,
    transactions: Vec<EscrowTransaction>,
}

impl EscrowPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take custody of `funded` currency, earmarking `amount` for the proposal
    pub fn fund(&mut self, proposal_id: u64, amount: u128, funded: u128, now: u64) -> Result<()> {
        let balance = self.check_fund(proposal_id, amount, funded)?;

        let excess = funded - amount;
        self.balance = balance;
        self.surplus += excess;
        self.earmarks.insert(proposal_id, amount);
        self.record(EscrowKind::Funded, proposal_id, amount, now);
        if excess > 0 {
            self.record(EscrowKind::Surplus, proposal_id, excess, now);
        }
        Ok(())
    }

    /// Preconditions of `fund`, without side effects. Returns the balance
    /// the pool would hold afterwards.
    pub fn check_fund(&self, proposal_id: u64, amount: u128, funded: u128) -> Result<u128> {
        if funded < amount {
            return Err(TreasuryError::InsufficientFunding {
                required: amount,
                provided: funded,
            });
        }
        if self.earmarks.contains_key(&proposal_id) {
            return Err(TreasuryError::InvalidAmount(format!(
                "proposal {} is already funded",
                proposal_id
            )));
        }
        self.balance
            .checked_add(funded)
            .ok_or_else(|| TreasuryError::InvalidAmount("escrow balance overflow".to_string()))
    }

    /// Remove the proposal's earmark from custody, returning the amount
    pub fn release(&mut self, proposal_id: u64, now: u64) -> Result<u128> {
        let amount = self.earmarks.remove(&proposal_id).ok_or_else(|| {
            TreasuryError::InvalidAmount(format!("proposal {} has no escrow", proposal_id))
        })?;
        self.balance -= amount;
        self.record(EscrowKind::Released, proposal_id, amount, now);
        Ok(amount)
    }

    pub fn earmarked(&self, proposal_id: u64) -> Option<u128> {
        self.earmarks.get(&proposal_id).copied()
    }

    pub fn balance(&self) -> u128 {
        self.balance
    }

    pub fn surplus(&self) -> u128 {
        self.surplus
    }

    pub fn transactions(&self) -> &[EscrowTransaction] {
        &self.transactions
    }

    pub fn stats(&self) -> EscrowStats {
        EscrowStats {
            balance: self.balance,
            earmarked: self.earmarks.values().sum(),
            surplus: self.surplus,
            total_released: self
                .transactions
                .iter()
                .filter(|tx| tx.kind == EscrowKind::Released)
                .map(|tx| tx.amount)
                .sum(),
            proposals_funded: self
                .transactions
                .iter()
                .filter(|tx| tx.kind == EscrowKind::Funded)
                .count(),
        }
    }

    fn record(&mut self, kind: EscrowKind, proposal_id: u64, amount: u128, timestamp: u64) {
        self.transactions.push(EscrowTransaction {
            kind,
            proposal_id,
            amount,
            timestamp,
        });
    }
}
