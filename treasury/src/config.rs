//! Construction-time configuration
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! min_debating_period = 86400
//! quorum_numerator = 800
//! token = "TKA"
//! engine_account = "treasury"
//! members_only = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TreasuryError};

/// Quorum is expressed out of this many parts (basis points)
pub const QUORUM_DENOMINATOR: u64 = 10_000;

/// Default minimum debating period (1 day)
pub const DEFAULT_MIN_DEBATING_PERIOD: u64 = 86_400;

/// Default quorum (8% of the voting supply)
pub const DEFAULT_QUORUM_NUMERATOR: u64 = 800;

pub const DEFAULT_TOKEN: &str = "TKA";

pub const DEFAULT_ENGINE_ACCOUNT: &str = "treasury";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreasuryConfig {
    /// Shortest debating period a proposal may request, in seconds
    pub min_debating_period: u64,

    /// Quorum numerator over `QUORUM_DENOMINATOR`
    pub quorum_numerator: u64,

    /// Reference token symbol
    pub token: String,

    /// Account the engine holds deposited tokens under
    pub engine_account: String,

    /// Require the member role for deposit, vote and unvote
    pub members_only: bool,

    /// Fixed quorum base. Snapshotted from the token supply when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_voting_supply: Option<u64>,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            min_debating_period: DEFAULT_MIN_DEBATING_PERIOD,
            quorum_numerator: DEFAULT_QUORUM_NUMERATOR,
            token: DEFAULT_TOKEN.to_string(),
            engine_account: DEFAULT_ENGINE_ACCOUNT.to_string(),
            members_only: true,
            total_voting_supply: None,
        }
    }
}

impl TreasuryConfig {
    /// Mirrors the deployment arguments: period, token, quorum
    pub fn new(min_debating_period: u64, token: &str, quorum_numerator: u64) -> Self {
        Self {
            min_debating_period,
            quorum_numerator,
            token: token.to_string(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: TreasuryConfig =
            toml::from_str(contents).map_err(|e| TreasuryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TreasuryError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TreasuryError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_debating_period == 0 {
            return Err(TreasuryError::Config(
                "min_debating_period must be positive".to_string(),
            ));
        }
        if self.quorum_numerator == 0 || self.quorum_numerator > QUORUM_DENOMINATOR {
            return Err(TreasuryError::Config(format!(
                "quorum_numerator must be in 1..={}, got {}",
                QUORUM_DENOMINATOR, self.quorum_numerator
            )));
        }
        if self.engine_account.is_empty() {
            return Err(TreasuryError::Config(
                "engine_account must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Smallest vote total that satisfies the quorum for `supply`
    pub fn required_votes(&self, supply: u64) -> u64 {
        let numerator = self.quorum_numerator as u128 * supply as u128;
        let denominator = QUORUM_DENOMINATOR as u128;
        numerator.div_ceil(denominator) as u64
    }

    pub fn quorum_reached(&self, votes: u64, supply: u64) -> bool {
        votes as u128 * QUORUM_DENOMINATOR as u128 >= self.quorum_numerator as u128 * supply as u128
    }
}
