//! Simulation state persisted between CLI invocations
//!
//! Holds the engine snapshot together with the in-memory token, currency,
//! role registry and clock it runs against.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use treasury::{
    Collaborators, CurrencyState, EngineSnapshot, GovernanceEngine, InMemoryCurrencyLedger,
    InMemoryTokenLedger, ManualClock, RoleRegistry, TokenState, TreasuryConfig,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SimulationState {
    pub now: u64,
    pub token: TokenState,
    pub currency: CurrencyState,
    pub members: Vec<String>,
    pub engine: EngineSnapshot,
}

/// Live collaborators plus the engine built on top of them
pub struct Simulation {
    pub engine: GovernanceEngine,
    pub token: Arc<InMemoryTokenLedger>,
    pub currency: Arc<InMemoryCurrencyLedger>,
    pub members: Arc<RoleRegistry>,
    pub clock: Arc<ManualClock>,
}

impl Simulation {
    /// Deploy a token minted to `admin`, then the engine over it
    pub fn deploy(config: TreasuryConfig, admin: &str, supply: u64, now: u64) -> Result<Self> {
        let token = Arc::new(InMemoryTokenLedger::new(&config.token));
        token.mint(admin, supply)?;
        let currency = Arc::new(InMemoryCurrencyLedger::new());
        let members = Arc::new(RoleRegistry::new());
        let clock = Arc::new(ManualClock::new(now));

        let engine = GovernanceEngine::new(
            config,
            Self::collaborators(&token, &currency, &members, &clock),
        )?;
        Ok(Self {
            engine,
            token,
            currency,
            members,
            clock,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {} (run `init` first)", path.display()))?;
        let state: SimulationState = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", path.display()))?;

        let token = Arc::new(InMemoryTokenLedger::from_state(state.token));
        let currency = Arc::new(InMemoryCurrencyLedger::from_state(state.currency));
        let members = Arc::new(RoleRegistry::from_members(state.members));
        let clock = Arc::new(ManualClock::new(state.now));

        let engine = GovernanceEngine::from_snapshot(
            state.engine,
            Self::collaborators(&token, &currency, &members, &clock),
        )?;
        Ok(Self {
            engine,
            token,
            currency,
            members,
            clock,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        use treasury::Clock;

        let state = SimulationState {
            now: self.clock.now(),
            token: self.token.state(),
            currency: self.currency.state(),
            members: self.members.members(),
            engine: self.engine.snapshot(),
        };
        let json = serde_json::to_string_pretty(&state)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("State saved to {}", path.display());
        Ok(())
    }

    fn collaborators(
        token: &Arc<InMemoryTokenLedger>,
        currency: &Arc<InMemoryCurrencyLedger>,
        members: &Arc<RoleRegistry>,
        clock: &Arc<ManualClock>,
    ) -> Collaborators {
        Collaborators {
            token: token.clone(),
            currency: currency.clone(),
            members: members.clone(),
            clock: clock.clone(),
        }
    }
}
