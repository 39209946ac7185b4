//! Engine configuration
//!
//! Everything tunable about a planning run, grouped so it can be loaded from
//! `engine.ron` in one piece.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CraftResult;
use crate::optimizer::{OptimizerConfig, TierBoostConfig};
use crate::pricing::DEFAULT_PRICE_TTL;
use crate::sim::SimConfig;

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// League passed to the price oracle
    pub league: String,
    pub sim: SimConfig,
    pub optimizer: OptimizerConfig,
    pub tier_boost: TierBoostConfig,
    /// Seconds a fetched price stays fresh
    pub price_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            league: "Standard".to_string(),
            sim: SimConfig::default(),
            optimizer: OptimizerConfig::default(),
            tier_boost: TierBoostConfig::default(),
            price_ttl_secs: DEFAULT_PRICE_TTL.as_secs(),
        }
    }
}

impl EngineConfig {
    /// Small runs for interactive what-if checks
    pub fn quick() -> Self {
        Self {
            sim: SimConfig::quick(),
            optimizer: OptimizerConfig {
                generations: 2,
                population_size: 8,
                evaluation_iterations: 100,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Large runs for final numbers
    pub fn thorough() -> Self {
        Self {
            sim: SimConfig::thorough(),
            optimizer: OptimizerConfig {
                generations: 8,
                population_size: 24,
                top_k: 6,
                evaluation_iterations: 500,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Same seed for the simulator and the search
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sim.seed = Some(seed);
        self.optimizer.seed = Some(seed);
        self
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }

    pub fn validate(&self) -> CraftResult<()> {
        self.optimizer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for config in [EngineConfig::default(), EngineConfig::quick(), EngineConfig::thorough()] {
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_with_seed_sets_both() {
        let config = EngineConfig::quick().with_seed(9);
        assert_eq!(config.sim.seed, Some(9));
        assert_eq!(config.optimizer.seed, Some(9));
        assert_eq!(config.price_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: EngineConfig = ron::from_str("(league: \"Dawn\")").unwrap();
        assert_eq!(config.league, "Dawn");
        assert_eq!(config.sim, SimConfig::default());
    }
}
