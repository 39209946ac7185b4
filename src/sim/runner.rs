//! Monte Carlo runner.
//!
//! Trials run in fixed-size batches across a rayon pool. Each batch owns a
//! ChaCha8 RNG derived from the base seed and its index, so a seeded run
//! gives the same numbers whatever the thread scheduling.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::config::SimConfig;
use super::report::SimulationResult;
use super::trial::{FailureReason, Tally, TrialRecord, TrialState};
use crate::cancel::CancellationToken;
use crate::catalog::KnowledgeBase;
use crate::error::{CraftError, CraftResult};
use crate::items::{ActionApplier, ItemState};
use crate::strategy::{CraftingStep, Strategy};

const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed for one batch of a run
pub fn batch_seed(base: u64, batch: usize) -> u64 {
    base ^ (batch as u64 + 1).wrapping_mul(SEED_MIX)
}

/// Runs strategies against the catalog
pub struct Simulator<'a> {
    kb: &'a KnowledgeBase,
    config: SimConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
    cancel: CancellationToken,
}

impl<'a> Simulator<'a> {
    pub fn new(kb: &'a KnowledgeBase, config: SimConfig) -> Self {
        let pool = config.workers.and_then(|workers| {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    log::warn!("Falling back to the global thread pool: {}", e);
                    None
                }
            }
        });
        Self {
            kb,
            config,
            pool,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run `iterations` trials with the configured retry multiplier and seed
    pub fn simulate_strategy(&self, strategy: &Strategy, iterations: usize) -> CraftResult<SimulationResult> {
        self.simulate_with(strategy, iterations, self.config.retry_multiplier, self.config.seed)
    }

    /// Run `iterations` trials with explicit retry multiplier and seed
    pub fn simulate_with(
        &self,
        strategy: &Strategy,
        iterations: usize,
        retry_multiplier: f64,
        seed: Option<u64>,
    ) -> CraftResult<SimulationResult> {
        self.kb.base(&strategy.target.base_type)?;
        if !retry_multiplier.is_finite() || retry_multiplier <= 0.0 {
            return Err(CraftError::Configuration(format!(
                "retry multiplier must be positive, got {}",
                retry_multiplier
            )));
        }

        let base_seed = seed.unwrap_or_else(rand::random);
        let batch_size = self.config.batch_size.max(1);
        let batches = self.config.batch_count(iterations);

        let run = || -> CraftResult<Vec<Option<Vec<TrialRecord>>>> {
            (0..batches)
                .into_par_iter()
                .map(|batch| {
                    if self.cancel.is_cancelled() {
                        return Ok(None);
                    }
                    let start = batch * batch_size;
                    let count = batch_size.min(iterations - start);
                    let mut rng = ChaCha8Rng::seed_from_u64(batch_seed(base_seed, batch));
                    let mut records = Vec::with_capacity(count);
                    for _ in 0..count {
                        records.push(self.run_trial(strategy, retry_multiplier, &mut rng)?);
                    }
                    Ok(Some(records))
                })
                .collect()
        };
        let batches = match &self.pool {
            Some(pool) => pool.install(run)?,
            None => run()?,
        };

        let cancelled = batches.iter().any(Option::is_none);
        let records: Vec<TrialRecord> = batches.into_iter().flatten().flatten().collect();
        let result = SimulationResult::from_trials(&records, cancelled);

        if cancelled {
            log::warn!(
                "Simulation of '{}' cancelled after {} of {} trials",
                strategy.name,
                records.len(),
                iterations
            );
        } else {
            log::debug!(
                "Simulated '{}': {} trials, success {:.3}, mean cost {:.2}",
                strategy.name,
                result.trials,
                result.success_probability,
                result.mean_cost
            );
        }
        Ok(result)
    }

    /// One trial with the configured retry multiplier
    pub fn simulate_single_trial(&self, strategy: &Strategy, rng: &mut impl Rng) -> CraftResult<TrialRecord> {
        self.run_trial(strategy, self.config.retry_multiplier, rng)
    }

    fn run_trial(&self, strategy: &Strategy, retry: f64, rng: &mut impl Rng) -> CraftResult<TrialRecord> {
        let applier = ActionApplier::new(self.kb);
        let target = &strategy.target;
        let mut item = applier.fresh_item(&target.base_type, target.item_level, rng)?;
        let mut tally = Tally::new();

        if item.satisfies(&target.required) {
            tally.state = TrialState::Success;
            return Ok(tally.finish());
        }

        for (index, step) in strategy.steps.iter().enumerate() {
            if let Err(reason) = self.run_step(&applier, step, index, &mut item, retry, &mut tally, rng)? {
                tally.state = TrialState::Failed(reason);
                break;
            }
            if item.satisfies(&target.required) {
                tally.state = TrialState::Success;
                break;
            }
        }

        if !tally.state.is_terminal() {
            tally.state = TrialState::Failed(FailureReason::StepsExhausted);
        }
        Ok(tally.finish())
    }

    /// Run one step (and its fallback chain) against the item.
    /// The outer error is a catalog fault, the inner one a trial failure.
    #[allow(clippy::too_many_arguments)]
    fn run_step(
        &self,
        applier: &ActionApplier<'_>,
        step: &CraftingStep,
        index: usize,
        item: &mut ItemState,
        retry: f64,
        tally: &mut Tally,
        rng: &mut impl Rng,
    ) -> CraftResult<Result<(), FailureReason>> {
        if let Some(target) = &step.target {
            if item.has_match(target) {
                return Ok(Ok(()));
            }
        }

        let action = self
            .kb
            .action(&step.action_id)
            .ok_or_else(|| CraftError::Catalog(format!("unknown action {}", step.action_id)))?;

        let reason = if !self.kb.is_applicable(action, item) {
            FailureReason::RequirementUnmet { step: index }
        } else {
            let probability = if step.probability.is_finite() {
                step.probability.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut landed = false;
            for _ in 0..step.attempt_cap(retry) {
                tally.charge(step.cost_per_attempt);
                if !rng.gen_bool(probability) {
                    continue;
                }
                let next = match &step.target {
                    Some(target) => applier.apply_targeted(action, item, target, rng)?,
                    None => Some(applier.apply(action, item, rng)?),
                };
                if let Some(next) = next {
                    *item = next;
                    landed = true;
                    break;
                }
            }
            if landed {
                return Ok(Ok(()));
            }
            FailureReason::AttemptCapExhausted { step: index }
        };

        match &step.fallback {
            Some(fallback) => self.run_step(applier, fallback, index, item, retry, tally, rng),
            None => Ok(Err(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_catalog;
    use crate::strategy::{DesiredItem, RequiredModifier};

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(default_catalog()).unwrap()
    }

    fn life_target() -> DesiredItem {
        DesiredItem::new("Sapphire Ring").with_modifier(RequiredModifier::new("maximum Life"))
    }

    #[test]
    fn test_batch_seeds_differ() {
        assert_ne!(batch_seed(42, 0), batch_seed(42, 1));
        assert_eq!(batch_seed(42, 3), batch_seed(42, 3));
    }

    #[test]
    fn test_empty_strategy_fails_with_steps_exhausted() {
        let kb = kb();
        let sim = Simulator::new(&kb, SimConfig::seeded(1));
        let strategy = Strategy::new("empty", life_target(), Vec::new());
        let result = sim.simulate_strategy(&strategy, 10).unwrap();
        assert_eq!(result.failures, 10);
        assert_eq!(result.failure_breakdown.get("steps_exhausted"), Some(&10));
    }

    #[test]
    fn test_unknown_base_is_an_error() {
        let kb = kb();
        let sim = Simulator::new(&kb, SimConfig::seeded(1));
        let strategy = Strategy::new(
            "bad",
            DesiredItem::new("Nothing").with_modifier(RequiredModifier::new("Life")),
            Vec::new(),
        );
        assert!(matches!(
            sim.simulate_strategy(&strategy, 10),
            Err(CraftError::UnknownBase(_))
        ));
    }

    #[test]
    fn test_trial_stops_once_target_is_met() {
        let kb = kb();
        let sim = Simulator::new(&kb, SimConfig::seeded(4));
        let life = RequiredModifier::new("maximum Life");
        let essence = CraftingStep::new("essence_body", "essence", Some(life), 1.0, 2.0);
        // Applicable to the magic item the essence leaves, but never needed
        let augment = CraftingStep::new("augmentation", "augment", None, 1.0, 50.0);
        let strategy = Strategy::new("early-exit", life_target(), vec![essence, augment]);

        let result = sim.simulate_strategy(&strategy, 40).unwrap();
        assert_eq!(result.successes, 40);
        assert!((result.mean_cost - 2.0).abs() < 1e-9);
        assert_eq!(result.attempt_histogram, std::collections::BTreeMap::from([(1, 40)]));
    }

    #[test]
    fn test_inapplicable_step_uses_fallback() {
        let kb = kb();
        let sim = Simulator::new(&kb, SimConfig::seeded(2));
        let life = RequiredModifier::new("maximum Life");
        // Exalted needs a rare item; the essence works on a normal one
        let step = CraftingStep::new("exalted", "exalt", Some(life.clone()), 0.2, 1.0)
            .with_fallback(CraftingStep::new("essence_body", "essence", Some(life), 1.0, 2.0));
        let strategy = Strategy::new("fallback", life_target(), vec![step]);

        let result = sim.simulate_strategy(&strategy, 50).unwrap();
        assert_eq!(result.successes, 50);
        assert!((result.mean_cost - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cancelled_run_is_flagged() {
        let kb = kb();
        let token = CancellationToken::new();
        token.cancel();
        let sim = Simulator::new(&kb, SimConfig::seeded(3)).with_cancellation(token);
        let step = CraftingStep::new("essence_body", "essence", None, 1.0, 1.0);
        let strategy = Strategy::new("cancelled", life_target(), vec![step]);

        let result = sim.simulate_strategy(&strategy, 1000).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.trials, 0);
    }

    #[test]
    fn test_dedicated_pool_matches_global_pool() {
        let kb = kb();
        let life = RequiredModifier::new("maximum Life");
        let step = CraftingStep::new("transmutation", "transmute", Some(life), 0.3, 0.1);
        let strategy = Strategy::new("transmute", life_target(), vec![step]);

        let global = Simulator::new(&kb, SimConfig::seeded(9));
        let dedicated = Simulator::new(
            &kb,
            SimConfig {
                workers: Some(2),
                ..SimConfig::seeded(9)
            },
        );
        assert_eq!(
            global.simulate_strategy(&strategy, 600).unwrap(),
            dedicated.simulate_strategy(&strategy, 600).unwrap()
        );
    }
}
