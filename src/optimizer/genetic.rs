//! Generational refinement
//!
//! A small evolutionary search over step lists. Crossover and mutation are
//! pure: they take their parents by reference and the RNG as a parameter.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

use super::config::OptimizerConfig;
use crate::cancel::CancellationToken;
use crate::error::CraftResult;
use crate::strategy::{CraftingStep, Strategy};

/// Name given to the winner of a refinement run
pub const REFINED_NAME: &str = "refined";

/// Where mutation draws replacement steps from, and how a changed step list
/// gets its odds and costs recomputed
pub trait StepSource {
    /// Steps that could take the place of `strategy.steps[index]`, evaluated
    /// at the item state the earlier steps lead to
    fn alternatives(&self, strategy: &Strategy, index: usize) -> CraftResult<Vec<CraftingStep>>;

    /// Refresh every step's probability and cost along the sequence
    fn reprice(&self, strategy: &mut Strategy) -> CraftResult<()>;
}

/// Child with `a`'s steps before a random cut and `b`'s steps after it.
///
/// Step figures are copied from the parents; run the result through
/// [`StepSource::reprice`] before scoring it.
pub fn crossover(a: &Strategy, b: &Strategy, rng: &mut impl Rng) -> Strategy {
    let shortest = a.steps.len().min(b.steps.len());
    let cut = rng.gen_range(0..=shortest);
    let mut steps: Vec<CraftingStep> = a.steps[..cut].to_vec();
    steps.extend_from_slice(&b.steps[cut..]);

    let mut child = Strategy::new(REFINED_NAME, a.target.clone(), steps);
    child.reset_evaluation();
    child
}

/// Copy of `strategy` with one targeted step swapped for another action
/// aimed at the same requirement, then repriced
pub fn mutate(strategy: &Strategy, source: &impl StepSource, rng: &mut impl Rng) -> CraftResult<Strategy> {
    let mut child = strategy.clone();
    child.reset_evaluation();

    let targeted: Vec<usize> = child
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.target.is_some())
        .map(|(i, _)| i)
        .collect();
    let Some(&index) = targeted.choose(rng) else {
        return Ok(child);
    };
    let current = child.steps[index].action_id.clone();
    let alternatives: Vec<CraftingStep> = source
        .alternatives(&child, index)?
        .into_iter()
        .filter(|s| s.action_id != current)
        .collect();
    if let Some(replacement) = alternatives.choose(rng) {
        child.steps[index] = replacement.clone();
        source.reprice(&mut child)?;
    }
    Ok(child)
}

fn dedupe(strategies: Vec<Strategy>) -> Vec<Strategy> {
    let mut seen = HashSet::new();
    strategies
        .into_iter()
        .filter(|s| seen.insert(s.signature()))
        .collect()
}

/// Evolve the seed strategies and return the best one found.
///
/// `evaluate` simulates and scores one candidate; candidates in a generation
/// are evaluated in parallel. Cancellation stops between generations and
/// keeps the best so far.
pub fn refine<E>(
    seeds: &[Strategy],
    config: &OptimizerConfig,
    source: &impl StepSource,
    evaluate: &E,
    cancel: &CancellationToken,
    rng: &mut impl Rng,
) -> CraftResult<Option<Strategy>>
where
    E: Fn(&Strategy, usize) -> CraftResult<Strategy> + Sync,
{
    if seeds.is_empty() || config.generations == 0 {
        return Ok(None);
    }
    let mut population: Vec<Strategy> = seeds.to_vec();
    while population.len() < config.population_size {
        let Some(parent) = seeds.choose(rng) else { break };
        population.push(mutate(parent, source, rng)?);
    }

    let mut best: Option<Strategy> = None;
    for generation in 0..config.generations {
        if cancel.is_cancelled() {
            log::info!("Refinement cancelled at generation {}", generation);
            break;
        }

        let mut evaluated = population
            .par_iter()
            .map(|candidate| evaluate(candidate, generation))
            .collect::<CraftResult<Vec<Strategy>>>()?;
        evaluated.sort_by(|a, b| b.score.total_cmp(&a.score));
        let elites: Vec<Strategy> = dedupe(evaluated).into_iter().take(config.top_k.max(1)).collect();

        if let Some(leader) = elites.first() {
            log::debug!(
                "Generation {}: best score {:.4} ({} steps)",
                generation,
                leader.score,
                leader.steps.len()
            );
            if best.as_ref().map_or(true, |b| leader.score > b.score) {
                best = Some(leader.clone());
            }
        }

        let mut next = elites.clone();
        while next.len() < config.population_size && !elites.is_empty() {
            let (Some(a), Some(b)) = (elites.choose(rng), elites.choose(rng)) else {
                break;
            };
            let mut child = crossover(a, b, rng);
            source.reprice(&mut child)?;
            if rng.gen_bool(config.mutation_rate.clamp(0.0, 1.0)) {
                child = mutate(&child, source, rng)?;
            }
            next.push(child);
        }
        population = next;
    }

    Ok(best.map(|mut winner| {
        winner.name = REFINED_NAME.to_string();
        winner
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{DesiredItem, RequiredModifier};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Offers a fixed set of steps for every requirement and counts reprices
    #[derive(Default)]
    struct FixedSource {
        steps: Vec<CraftingStep>,
        reprices: AtomicUsize,
    }

    impl StepSource for FixedSource {
        fn alternatives(&self, strategy: &Strategy, index: usize) -> CraftResult<Vec<CraftingStep>> {
            let label = strategy.steps[index].target.as_ref().map(|t| t.label());
            Ok(self
                .steps
                .iter()
                .filter(|s| s.target.as_ref().map(|t| t.label()) == label)
                .cloned()
                .collect())
        }

        fn reprice(&self, strategy: &mut Strategy) -> CraftResult<()> {
            self.reprices.fetch_add(1, Ordering::SeqCst);
            for step in &mut strategy.steps {
                *step = CraftingStep::new(step.action_id.clone(), step.description.clone(), step.target.clone(), 1.0, 1.0);
            }
            Ok(())
        }
    }

    fn step(action: &str, target: &str) -> CraftingStep {
        CraftingStep::new(action, action, Some(RequiredModifier::new(target)), 0.5, 1.0)
    }

    fn strategy(name: &str, steps: Vec<CraftingStep>) -> Strategy {
        Strategy::new(name, DesiredItem::new("Sapphire Ring"), steps)
    }

    #[test]
    fn test_crossover_splices_parents() {
        let a = strategy("a", vec![step("a1", "x"), step("a2", "y"), step("a3", "z")]);
        let b = strategy("b", vec![step("b1", "x"), step("b2", "y"), step("b3", "z")]);
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        for _ in 0..50 {
            let child = crossover(&a, &b, &mut rng);
            assert_eq!(child.steps.len(), 3);
            let cut = child.steps.iter().take_while(|s| s.action_id.starts_with('a')).count();
            assert!(child.steps[cut..].iter().all(|s| s.action_id.starts_with('b')));
            assert!(child.simulation.is_none());
        }
    }

    #[test]
    fn test_crossover_is_reproducible() {
        let a = strategy("a", vec![step("a1", "x"), step("a2", "y")]);
        let b = strategy("b", vec![step("b1", "x"), step("b2", "y")]);
        let first = crossover(&a, &b, &mut ChaCha8Rng::seed_from_u64(8));
        let second = crossover(&a, &b, &mut ChaCha8Rng::seed_from_u64(8));
        assert_eq!(first, second);
    }

    #[test]
    fn test_mutate_swaps_in_new_action_and_reprices() {
        let a = strategy("a", vec![step("transmutation", "Life")]);
        let source = FixedSource {
            steps: vec![step("transmutation", "Life"), step("essence_body", "Life"), step("exalted", "Cold")],
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let child = mutate(&a, &source, &mut rng).unwrap();
        assert_eq!(child.steps[0].action_id, "essence_body");
        assert_eq!(child.steps[0].target.as_ref().unwrap().pattern, "Life");
        assert_eq!(child.steps[0].probability, 1.0);
        assert_eq!(source.reprices.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutate_without_alternatives_is_unchanged() {
        let a = strategy("a", vec![step("transmutation", "Life")]);
        let source = FixedSource::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let child = mutate(&a, &source, &mut rng).unwrap();
        assert_eq!(child.steps, a.steps);
        assert_eq!(source.reprices.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_refine_returns_best_scoring() {
        let cheap = strategy("cheap", vec![step("transmutation", "Life")]);
        let sure = strategy("sure", vec![step("essence_body", "Life")]);
        let config = OptimizerConfig {
            generations: 3,
            population_size: 4,
            top_k: 2,
            ..Default::default()
        };
        let evaluate = |s: &Strategy, _generation: usize| -> CraftResult<Strategy> {
            let mut scored = s.clone();
            scored.score = if s.steps[0].action_id == "essence_body" { 1.0 } else { 0.0 };
            Ok(scored)
        };
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let source = FixedSource::default();
        let best = refine(&[cheap, sure], &config, &source, &evaluate, &CancellationToken::new(), &mut rng)
            .unwrap()
            .unwrap();
        assert_eq!(best.name, REFINED_NAME);
        assert_eq!(best.steps[0].action_id, "essence_body");
    }

    #[test]
    fn test_refine_cancelled_before_start() {
        let seed = strategy("a", vec![step("transmutation", "Life")]);
        let token = CancellationToken::new();
        token.cancel();
        let evaluate = |s: &Strategy, _: usize| -> CraftResult<Strategy> { Ok(s.clone()) };
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let best = refine(&[seed], &OptimizerConfig::default(), &FixedSource::default(), &evaluate, &token, &mut rng).unwrap();
        assert!(best.is_none());
    }
}
