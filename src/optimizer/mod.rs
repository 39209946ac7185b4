//! Strategy optimizer
//!
//! Proposes candidate strategies from several heuristics, optionally evolves
//! them, evaluates each with the simulator, and returns them ranked by the
//! configured objective.

pub mod config;
pub mod genetic;
pub mod heuristics;

use std::collections::HashSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub use config::{Objective, OptimizerConfig, RiskTolerance, TierBoostConfig};
pub use genetic::{crossover, mutate, refine, StepSource, REFINED_NAME};
pub use heuristics::{Heuristic, Planner, StepOption};

use crate::cancel::CancellationToken;
use crate::catalog::KnowledgeBase;
use crate::error::{CraftError, CraftResult};
use crate::pricing::{CostCalculator, MarketSource, PriceService};
use crate::sim::{batch_seed, SimConfig, Simulator};
use crate::strategy::{DesiredItem, Strategy};

/// Ranked strategies for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySet {
    pub target: DesiredItem,
    pub strategies: Vec<Strategy>,
    /// Why the list is empty, when it is
    pub reason: Option<String>,
}

impl StrategySet {
    pub fn best(&self) -> Option<&Strategy> {
        self.strategies.first()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Human-readable summary of every strategy
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "Target: {} (ilvl {})\n",
            self.target.base_type, self.target.item_level
        );
        for required in &self.target.required {
            out.push_str(&format!("  - {}\n", required.label()));
        }
        if let Some(reason) = &self.reason {
            out.push_str(&format!("No strategies: {}\n", reason));
        }
        for (rank, strategy) in self.strategies.iter().enumerate() {
            out.push_str(&format!("\n#{} {}\n", rank + 1, strategy.name));
            for (i, step) in strategy.steps.iter().enumerate() {
                out.push_str(&format!(
                    "  {}. {} (p={:.3}, ~{:.1} tries, {:.2} ex)\n",
                    i + 1,
                    step.description,
                    step.probability,
                    step.expected_attempts,
                    step.expected_cost
                ));
            }
            if let Some(cost) = &strategy.total_cost {
                out.push_str(&format!(
                    "  Expected cost {:.2} ex (range {:.2} - {:.2})\n",
                    cost.expected, cost.minimum, cost.maximum
                ));
            }
            if let Some(sim) = &strategy.simulation {
                for line in sim.to_text().lines() {
                    out.push_str(&format!("  {}\n", line));
                }
            }
            if let Some(rec) = &strategy.recommendation {
                out.push_str(&format!(
                    "  Recommendation: {} - {}\n",
                    rec.recommendation.name(),
                    rec.reasoning
                ));
            }
        }
        out
    }
}

/// Objective score of an evaluated strategy (higher is better)
pub fn score(objective: Objective, strategy: &Strategy, market_value: Option<f64>) -> f64 {
    let Some(sim) = &strategy.simulation else {
        return f64::NEG_INFINITY;
    };
    match objective {
        Objective::Cost => -sim.cost_per_success(),
        Objective::SuccessRate => sim.success_probability,
        Objective::Time => -(sim.mean_attempts / sim.success_probability.max(0.01)),
        Objective::Profit => sim.success_probability * market_value.unwrap_or(0.0) - sim.mean_cost,
    }
}

/// Builds, evaluates and ranks strategies
pub struct StrategyOptimizer<'a> {
    kb: &'a KnowledgeBase,
    prices: &'a PriceService,
    market: &'a dyn MarketSource,
    sim_config: SimConfig,
    tier_boost: TierBoostConfig,
    cancel: CancellationToken,
}

impl<'a> StrategyOptimizer<'a> {
    pub fn new(
        kb: &'a KnowledgeBase,
        prices: &'a PriceService,
        market: &'a dyn MarketSource,
        sim_config: SimConfig,
        tier_boost: TierBoostConfig,
    ) -> Self {
        Self {
            kb,
            prices,
            market,
            sim_config,
            tier_boost,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Ranked strategies for the target
    pub fn optimize_strategy(&self, target: &DesiredItem, config: &OptimizerConfig) -> CraftResult<Vec<Strategy>> {
        self.optimize(target, config).map(|set| set.strategies)
    }

    /// Ranked strategies with the reason the list is empty, if it is
    pub fn optimize(&self, target: &DesiredItem, config: &OptimizerConfig) -> CraftResult<StrategySet> {
        target.validate()?;
        config.validate()?;
        self.kb.base(&target.base_type)?;

        let unmet = self
            .kb
            .unmet_requirements(&target.base_type, target.item_level, &target.required);
        if !unmet.is_empty() {
            return Err(CraftError::Infeasible { unmet });
        }

        let costs = CostCalculator::new(self.kb, self.prices);
        let planner = Planner::new(self.kb, costs, self.tier_boost, config.prefer_deterministic);

        let mut candidates = Vec::new();
        let mut seen = HashSet::new();
        for heuristic in Heuristic::all() {
            match planner.plan(target, heuristic)? {
                Some(strategy) if seen.insert(strategy.signature()) => candidates.push(strategy),
                Some(strategy) => log::debug!("{} duplicates an earlier candidate", strategy.name),
                None => log::debug!("{} could not plan every requirement", heuristic.name()),
            }
        }
        if candidates.is_empty() {
            return Ok(StrategySet {
                target: target.clone(),
                strategies: Vec::new(),
                reason: Some("no heuristic could plan every required modifier".to_string()),
            });
        }
        log::info!("Generated {} candidate strategies", candidates.len());

        let retry = config.risk_tolerance.retry_multiplier();
        let seed = config.seed.or(self.sim_config.seed);
        let market_value = costs.market_price(target, self.market);
        let simulator = Simulator::new(self.kb, self.sim_config.clone()).with_cancellation(self.cancel.clone());

        let evaluate = |strategy: &Strategy, iterations: usize, run_seed: Option<u64>| -> CraftResult<Strategy> {
            let mut evaluated = strategy.clone();
            evaluated.simulation = Some(simulator.simulate_with(strategy, iterations, retry, run_seed)?);
            evaluated.total_cost = Some(costs.calculate_strategy_cost(&evaluated));
            evaluated.score = score(config.optimize_for, &evaluated, market_value);
            Ok(evaluated)
        };

        if config.generations > 0 {
            let mut rng = match seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            let generation_seed = |generation: usize| seed.map(|s| batch_seed(s, generation + 1_000));
            let refined = refine(
                &candidates,
                config,
                &planner,
                &|s: &Strategy, generation: usize| {
                    evaluate(s, config.evaluation_iterations, generation_seed(generation))
                },
                &self.cancel,
                &mut rng,
            )?;
            if let Some(refined) = refined {
                if seen.insert(refined.signature()) {
                    candidates.push(refined);
                }
            }
        }

        let mut evaluated = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            evaluated.push(evaluate(candidate, self.sim_config.iterations, seed)?);
        }
        Ok(self.rank(target, config, evaluated))
    }

    fn rank(&self, target: &DesiredItem, config: &OptimizerConfig, evaluated: Vec<Strategy>) -> StrategySet {
        let min_success = config.risk_tolerance.min_success_rate();
        let total = evaluated.len();
        let mut below_success = 0;
        let mut over_budget = 0;

        let mut kept: Vec<Strategy> = evaluated
            .into_iter()
            .filter(|s| {
                let success = s.simulation.as_ref().map_or(0.0, |sim| sim.success_probability);
                if success < min_success {
                    below_success += 1;
                    return false;
                }
                if let Some(budget) = target.budget {
                    if s.expected_cost() > budget {
                        over_budget += 1;
                        return false;
                    }
                }
                true
            })
            .collect();

        match config.optimize_for {
            Objective::Cost => kept.sort_by(|a, b| a.expected_cost().total_cmp(&b.expected_cost())),
            _ => kept.sort_by(|a, b| b.score.total_cmp(&a.score)),
        }

        if let Some(top) = kept.first_mut() {
            let costs = CostCalculator::new(self.kb, self.prices);
            top.recommendation = Some(costs.compare_craft_vs_buy(target, top, self.market));
        }

        let reason = kept.is_empty().then(|| {
            format!(
                "all {} candidates were rejected ({} below the {:.0}% success floor, {} over budget)",
                total,
                below_success,
                min_success * 100.0,
                over_budget
            )
        });
        log::info!("Returning {} of {} strategies", kept.len(), total);

        StrategySet {
            target: target.clone(),
            strategies: kept,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_catalog;
    use crate::pricing::{NoMarket, StaticPriceOracle};
    use crate::strategy::RequiredModifier;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (KnowledgeBase, PriceService) {
        let kb = KnowledgeBase::new(default_catalog()).unwrap();
        let prices = PriceService::new(Arc::new(StaticPriceOracle::new()), &kb, "Standard", Duration::from_secs(60));
        (kb, prices)
    }

    fn target() -> DesiredItem {
        DesiredItem::new("Sapphire Ring")
            .with_modifier(RequiredModifier::new("maximum Life"))
            .with_modifier(RequiredModifier::new("Cold Resistance"))
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig {
            seed: Some(17),
            generations: 2,
            population_size: 6,
            top_k: 3,
            evaluation_iterations: 100,
            risk_tolerance: RiskTolerance::High,
            ..Default::default()
        }
    }

    #[test]
    fn test_cost_objective_sorts_ascending() {
        let (kb, prices) = setup();
        let optimizer = StrategyOptimizer::new(&kb, &prices, &NoMarket, SimConfig::quick(), TierBoostConfig::default());

        let strategies = optimizer.optimize_strategy(&target(), &config()).unwrap();
        assert!(!strategies.is_empty());
        let costs: Vec<f64> = strategies.iter().map(|s| s.total_cost.as_ref().unwrap().expected).collect();
        assert!(costs.windows(2).all(|w| w[0] <= w[1]));
        assert!(strategies[0].recommendation.is_some());
    }

    #[test]
    fn test_infeasible_target_names_modifier() {
        let (kb, prices) = setup();
        let optimizer = StrategyOptimizer::new(&kb, &prices, &NoMarket, SimConfig::quick(), TierBoostConfig::default());
        let target = target().with_modifier(RequiredModifier::new("Spell Suppression"));

        match optimizer.optimize(&target, &config()) {
            Err(CraftError::Infeasible { unmet }) => assert_eq!(unmet, vec!["Spell Suppression".to_string()]),
            other => panic!("expected infeasible, got {:?}", other.map(|s| s.strategies.len())),
        }
    }

    #[test]
    fn test_tiny_budget_empties_list_with_reason() {
        let (kb, prices) = setup();
        let optimizer = StrategyOptimizer::new(&kb, &prices, &NoMarket, SimConfig::quick(), TierBoostConfig::default());
        let target = target().with_budget(1e-9);

        let set = optimizer.optimize(&target, &OptimizerConfig::heuristics_only()).unwrap();
        assert!(set.is_empty());
        assert!(set.reason.unwrap().contains("over budget"));
    }

    #[test]
    fn test_seeded_optimization_is_reproducible() {
        let (kb, prices) = setup();
        let optimizer = StrategyOptimizer::new(&kb, &prices, &NoMarket, SimConfig::quick(), TierBoostConfig::default());

        let first = optimizer.optimize(&target(), &config()).unwrap();
        let second = optimizer.optimize(&target(), &config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_score_objectives() {
        let mut strategy = Strategy::new("s", target(), Vec::new());
        assert_eq!(score(Objective::Cost, &strategy, None), f64::NEG_INFINITY);

        strategy.simulation = Some(crate::sim::SimulationResult {
            trials: 10,
            successes: 5,
            success_probability: 0.5,
            mean_cost: 4.0,
            mean_attempts: 3.0,
            ..Default::default()
        });
        assert_eq!(score(Objective::Cost, &strategy, None), -8.0);
        assert_eq!(score(Objective::SuccessRate, &strategy, None), 0.5);
        assert_eq!(score(Objective::Time, &strategy, None), -6.0);
        assert_eq!(score(Objective::Profit, &strategy, Some(20.0)), 6.0);
    }
}
