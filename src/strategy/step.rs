//! Crafting steps and strategies

use serde::{Deserialize, Serialize};

use super::target::{DesiredItem, RequiredModifier};
use crate::pricing::{CostBreakdown, Recommendation};
use crate::sim::SimulationResult;

/// Upper bound on draws for a single step, however unlikely it is
pub const MAX_ATTEMPTS_PER_STEP: u32 = 100_000;

/// One action within a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftingStep {
    pub action_id: String,
    pub description: String,
    /// Modifier this step aims at; None for setup steps such as rarity upgrades
    pub target: Option<RequiredModifier>,
    /// Chance a single use hits the target
    pub probability: f64,
    pub cost_per_attempt: f64,
    pub expected_attempts: f64,
    pub expected_cost: f64,
    /// Run when this step runs out of attempts or cannot be applied
    pub fallback: Option<Box<CraftingStep>>,
}

impl CraftingStep {
    pub fn new(
        action_id: impl Into<String>,
        description: impl Into<String>,
        target: Option<RequiredModifier>,
        probability: f64,
        cost_per_attempt: f64,
    ) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Capped so impossible steps stay finite and serializable
        let expected_attempts = if probability > 0.0 {
            (1.0 / probability).min(MAX_ATTEMPTS_PER_STEP as f64)
        } else {
            MAX_ATTEMPTS_PER_STEP as f64
        };
        Self {
            action_id: action_id.into(),
            description: description.into(),
            target,
            probability,
            cost_per_attempt,
            expected_attempts,
            expected_cost: cost_per_attempt * expected_attempts,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: CraftingStep) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Maximum draws before the step is abandoned, at least one
    pub fn attempt_cap(&self, retry_multiplier: f64) -> u32 {
        let cap = (self.expected_attempts * retry_multiplier).ceil();
        if cap.is_finite() {
            (cap as u32).clamp(1, MAX_ATTEMPTS_PER_STEP)
        } else {
            MAX_ATTEMPTS_PER_STEP
        }
    }

    pub fn is_deterministic(&self) -> bool {
        self.probability >= 1.0
    }

    /// Identity used to deduplicate strategies
    pub fn signature(&self) -> String {
        match &self.target {
            Some(target) => format!("{}>{}", self.action_id, target.label()),
            None => self.action_id.clone(),
        }
    }
}

/// An ordered sequence of steps aimed at a target item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub target: DesiredItem,
    pub steps: Vec<CraftingStep>,
    #[serde(default)]
    pub simulation: Option<SimulationResult>,
    #[serde(default)]
    pub total_cost: Option<CostBreakdown>,
    /// Objective score from the last evaluation (higher is better)
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
}

impl Strategy {
    pub fn new(name: impl Into<String>, target: DesiredItem, steps: Vec<CraftingStep>) -> Self {
        Self {
            name: name.into(),
            target,
            steps,
            simulation: None,
            total_cost: None,
            score: 0.0,
            recommendation: None,
        }
    }

    /// Expected cost from the attached breakdown, or the sum of step costs
    pub fn expected_cost(&self) -> f64 {
        self.total_cost
            .as_ref()
            .map_or_else(|| self.steps.iter().map(|s| s.expected_cost).sum(), |c| c.expected)
    }

    pub fn signature(&self) -> String {
        self.steps
            .iter()
            .map(CraftingStep::signature)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Drop evaluation results after the step list changed
    pub fn reset_evaluation(&mut self) {
        self.simulation = None;
        self.total_cost = None;
        self.score = 0.0;
        self.recommendation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_attempts_and_cap() {
        let step = CraftingStep::new("exalted", "Exalt", None, 0.1, 2.0);
        assert!((step.expected_attempts - 10.0).abs() < 1e-9);
        assert!((step.expected_cost - 20.0).abs() < 1e-9);
        assert_eq!(step.attempt_cap(1.0), 10);
        assert_eq!(step.attempt_cap(1.5), 15);
    }

    #[test]
    fn test_deterministic_cap_is_one() {
        let step = CraftingStep::new("essence", "Essence", None, 1.0, 3.0);
        assert_eq!(step.attempt_cap(0.2), 1);
        assert!(step.is_deterministic());
    }

    #[test]
    fn test_impossible_step_is_bounded() {
        let step = CraftingStep::new("exalted", "Exalt", None, 0.0, 1.0);
        assert_eq!(step.attempt_cap(3.0), MAX_ATTEMPTS_PER_STEP);
        assert_eq!(step.expected_attempts, MAX_ATTEMPTS_PER_STEP as f64);
        assert!(step.expected_cost.is_finite());
    }

    #[test]
    fn test_impossible_step_survives_json() {
        let target = DesiredItem::new("Sapphire Ring");
        let strategy = Strategy::new(
            "impossible",
            target,
            vec![CraftingStep::new("exalted", "Exalt", Some(RequiredModifier::new("Life")), 0.0, 1.0)],
        );
        let json = serde_json::to_string(&strategy).unwrap();
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, strategy);
    }

    #[test]
    fn test_signature_and_expected_cost() {
        let target = DesiredItem::new("Sapphire Ring");
        let steps = vec![
            CraftingStep::new("transmutation", "a", Some(RequiredModifier::new("Life")), 0.5, 1.0),
            CraftingStep::new("regal", "b", None, 1.0, 4.0),
        ];
        let strategy = Strategy::new("test", target, steps);
        assert_eq!(strategy.signature(), "transmutation>Life | regal");
        assert!((strategy.expected_cost() - 6.0).abs() < 1e-9);
    }
}
