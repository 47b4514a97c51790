//! Shared async handle to a governance engine
//!
//! All mutating calls on one engine are linearised behind a single lock that
//! is held for the whole operation, so two concurrent votes can never both
//! see the same available deposit.

use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::TreasuryConfig;
use crate::engine::{Collaborators, EngineSnapshot, GovernanceEngine};
use crate::error::Result;
use crate::events::GovernanceEvent;
use crate::pool::EscrowStats;
use crate::proposal::{Proposal, ProposalParams, ProposalState};

#[derive(Clone)]
pub struct TreasuryService {
    engine: Arc<Mutex<GovernanceEngine>>,
}

impl TreasuryService {
    pub fn new(engine: GovernanceEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Restore from a JSON snapshot, or start fresh if the file does not exist
    pub async fn load<P: AsRef<Path>>(
        path: P,
        config: TreasuryConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            debug!("No snapshot at {}, starting fresh", path.display());
            return Ok(Self::new(GovernanceEngine::new(config, collaborators)?));
        }

        let data = tokio::fs::read_to_string(path).await?;
        let snapshot: EngineSnapshot = serde_json::from_str(&data)?;
        info!(
            "Loaded treasury snapshot from {} ({} proposals)",
            path.display(),
            snapshot.proposals.len()
        );
        Ok(Self::new(GovernanceEngine::from_snapshot(
            snapshot,
            collaborators,
        )?))
    }

    /// Write the current state as pretty JSON
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.engine.lock().await.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path.as_ref(), json).await?;
        debug!("Saved treasury snapshot to {}", path.as_ref().display());
        Ok(())
    }

    pub async fn create_proposal(
        &self,
        params: ProposalParams,
        funded_amount: u128,
    ) -> Result<(u64, GovernanceEvent)> {
        self.engine
            .lock()
            .await
            .create_proposal(params, funded_amount)
    }

    pub async fn deposit(&self, account: &str, amount: u64) -> Result<u64> {
        self.engine.lock().await.deposit(account, amount)
    }

    pub async fn vote(&self, account: &str, proposal_id: u64, amount: u64) -> Result<GovernanceEvent> {
        self.engine.lock().await.vote(account, proposal_id, amount)
    }

    pub async fn unvote(&self, account: &str, proposal_id: u64) -> Result<GovernanceEvent> {
        self.engine.lock().await.unvote(account, proposal_id)
    }

    pub async fn execute_proposal(&self, proposal_id: u64) -> Result<GovernanceEvent> {
        self.engine.lock().await.execute_proposal(proposal_id)
    }

    pub async fn proposal(&self, proposal_id: u64) -> Result<Proposal> {
        self.engine.lock().await.proposal(proposal_id).cloned()
    }

    pub async fn proposals(&self) -> Vec<Proposal> {
        self.engine
            .lock()
            .await
            .proposals()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn proposal_state(&self, proposal_id: u64) -> Result<ProposalState> {
        self.engine.lock().await.proposal_state(proposal_id)
    }

    pub async fn available(&self, account: &str) -> u64 {
        self.engine.lock().await.available(account)
    }

    pub async fn deposit_balance(&self, account: &str) -> u64 {
        self.engine.lock().await.deposit_balance(account)
    }

    pub async fn escrow_stats(&self) -> EscrowStats {
        self.engine.lock().await.escrow().stats()
    }

    pub async fn events(&self) -> Vec<GovernanceEvent> {
        self.engine.lock().await.events().to_vec()
    }

    pub async fn drain_events(&self) -> Vec<GovernanceEvent> {
        self.engine.lock().await.drain_events()
    }

    /// Run a read-only closure against the engine under the lock
    pub async fn inspect<R>(&self, f: impl FnOnce(&GovernanceEngine) -> R) -> R {
        let engine = self.engine.lock().await;
        f(&engine)
    }
}
