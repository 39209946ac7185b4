//! Optimizer configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::CurrencyTier;
use crate::error::{CraftError, CraftResult};

/// How much failure risk a strategy may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    /// Attempt cap per step, as a multiple of expected attempts
    pub fn retry_multiplier(&self) -> f64 {
        match self {
            RiskTolerance::Low => 3.0,
            RiskTolerance::Medium => 2.0,
            RiskTolerance::High => 1.5,
        }
    }

    /// Lowest observed success rate a returned strategy may have
    pub fn min_success_rate(&self) -> f64 {
        match self {
            RiskTolerance::Low => 0.5,
            RiskTolerance::Medium => 0.25,
            RiskTolerance::High => 0.0,
        }
    }
}

impl FromStr for RiskTolerance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskTolerance::Low),
            "medium" => Ok(RiskTolerance::Medium),
            "high" => Ok(RiskTolerance::High),
            other => Err(format!("unknown risk tolerance '{}' (low, medium, high)", other)),
        }
    }
}

/// What the optimizer ranks strategies by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    Cost,
    SuccessRate,
    Time,
    Profit,
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Objective::Cost => "cost",
            Objective::SuccessRate => "success_rate",
            Objective::Time => "time",
            Objective::Profit => "profit",
        };
        f.write_str(name)
    }
}

impl FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "cost" => Ok(Objective::Cost),
            "success_rate" | "success" => Ok(Objective::SuccessRate),
            "time" => Ok(Objective::Time),
            "profit" => Ok(Objective::Profit),
            other => Err(format!(
                "unknown objective '{}' (cost, success_rate, time, profit)",
                other
            )),
        }
    }
}

/// Search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub risk_tolerance: RiskTolerance,
    pub optimize_for: Objective,
    /// Favour guaranteed actions when they cost about the same
    pub prefer_deterministic: bool,
    /// Refinement generations (0 = heuristics only)
    pub generations: usize,
    pub population_size: usize,
    /// Survivors per generation
    pub top_k: usize,
    /// Chance an offspring gets one step replaced
    pub mutation_rate: f64,
    /// Trials per candidate during refinement
    pub evaluation_iterations: usize,
    /// Seed for the search and its evaluations (None = random)
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_tolerance: RiskTolerance::Medium,
            optimize_for: Objective::Cost,
            prefer_deterministic: false,
            generations: 4,
            population_size: 12,
            top_k: 4,
            mutation_rate: 0.2,
            evaluation_iterations: 200,
            seed: None,
        }
    }
}

impl OptimizerConfig {
    /// Heuristic candidates only, no refinement
    pub fn heuristics_only() -> Self {
        Self {
            generations: 0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> CraftResult<()> {
        if self.generations > 0 {
            if self.population_size < 2 {
                return Err(CraftError::Configuration(
                    "population size must be at least 2".to_string(),
                ));
            }
            if self.top_k == 0 || self.top_k > self.population_size {
                return Err(CraftError::Configuration(
                    "top_k must be between 1 and the population size".to_string(),
                ));
            }
            if self.evaluation_iterations == 0 {
                return Err(CraftError::Configuration(
                    "evaluation iterations must be positive".to_string(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(CraftError::Configuration(
                "mutation rate must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Probability multipliers for higher-grade currencies.
///
/// Effective multipliers never decrease with the grade, and a boosted
/// probability never exceeds 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierBoostConfig {
    pub basic: f64,
    pub greater: f64,
    pub perfect: f64,
}

impl Default for TierBoostConfig {
    fn default() -> Self {
        Self {
            basic: 1.0,
            greater: 1.25,
            perfect: 1.5,
        }
    }
}

impl TierBoostConfig {
    /// Multiplier for a grade, floored at the grade below it
    pub fn multiplier(&self, tier: CurrencyTier) -> f64 {
        let basic = sanitize(self.basic);
        let greater = sanitize(self.greater).max(basic);
        match tier {
            CurrencyTier::Basic => basic,
            CurrencyTier::Greater => greater,
            CurrencyTier::Perfect => sanitize(self.perfect).max(greater),
        }
    }

    /// Boosted probability, clamped to [0, 1]
    pub fn apply(&self, tier: CurrencyTier, probability: f64) -> f64 {
        (probability * self.multiplier(tier)).clamp(0.0, 1.0)
    }
}

fn sanitize(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier > 0.0 {
        multiplier
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_settings() {
        assert_eq!(RiskTolerance::Low.retry_multiplier(), 3.0);
        assert_eq!(RiskTolerance::Medium.retry_multiplier(), 2.0);
        assert_eq!(RiskTolerance::High.retry_multiplier(), 1.5);
        assert_eq!(RiskTolerance::Low.min_success_rate(), 0.5);
        assert_eq!(RiskTolerance::High.min_success_rate(), 0.0);
        assert_eq!("HIGH".parse::<RiskTolerance>(), Ok(RiskTolerance::High));
        assert!("reckless".parse::<RiskTolerance>().is_err());
    }

    #[test]
    fn test_objective_parse() {
        assert_eq!("success-rate".parse::<Objective>(), Ok(Objective::SuccessRate));
        assert_eq!(Objective::SuccessRate.to_string(), "success_rate");
    }

    #[test]
    fn test_tier_boost_is_monotonic_and_clamped() {
        let boost = TierBoostConfig::default();
        let tiers = [CurrencyTier::Basic, CurrencyTier::Greater, CurrencyTier::Perfect];
        for pair in tiers.windows(2) {
            assert!(boost.multiplier(pair[1]) >= boost.multiplier(pair[0]));
        }
        assert_eq!(boost.apply(CurrencyTier::Perfect, 0.9), 1.0);

        // A misordered table still behaves monotonically
        let odd = TierBoostConfig {
            basic: 1.0,
            greater: 2.0,
            perfect: 0.5,
        };
        assert!(odd.multiplier(CurrencyTier::Perfect) >= odd.multiplier(CurrencyTier::Greater));
        for p in [0.0, 0.1, 0.5, 0.99] {
            assert!(odd.apply(CurrencyTier::Greater, p) >= odd.apply(CurrencyTier::Basic, p));
            assert!(odd.apply(CurrencyTier::Perfect, p) <= 1.0);
        }
    }

    #[test]
    fn test_validate() {
        assert!(OptimizerConfig::default().validate().is_ok());
        let bad = OptimizerConfig {
            top_k: 50,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(OptimizerConfig {
            population_size: 0,
            ..OptimizerConfig::heuristics_only()
        }
        .validate()
        .is_ok());
    }
}
