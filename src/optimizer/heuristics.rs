//! Heuristic strategy construction
//!
//! Each heuristic walks the target's requirements in order of importance,
//! projecting the item forward one step at a time and choosing, for every
//! unmet requirement, one of the actions that can produce it. The runner-up
//! becomes the step's fallback.

use std::cmp::Ordering;

use super::config::TierBoostConfig;
use super::genetic::StepSource;
use crate::catalog::{ActionCategory, CraftingAction, KnowledgeBase, Op};
use crate::error::CraftResult;
use crate::items::{ActionApplier, ItemState};
use crate::pricing::CostCalculator;
use crate::strategy::{CraftingStep, DesiredItem, RequiredModifier, Strategy};

/// Setup steps allowed in a row before a requirement is given up on
const MAX_SETUP_STEPS: usize = 2;

/// A deterministic option wins when within this factor of the cheapest
const DETERMINISTIC_SLACK: f64 = 1.25;

/// Candidate generation heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heuristic {
    /// Guaranteed actions first, then the most likely ones
    DeterministicFirst,
    /// Cheapest action per use, whatever its odds
    Budget,
    /// Only tier-restricted or guaranteed actions
    Premium,
    /// Alternates deterministic-first and budget choices
    Hybrid,
}

impl Heuristic {
    pub fn all() -> [Heuristic; 4] {
        [
            Heuristic::DeterministicFirst,
            Heuristic::Budget,
            Heuristic::Premium,
            Heuristic::Hybrid,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Heuristic::DeterministicFirst => "deterministic-first",
            Heuristic::Budget => "budget",
            Heuristic::Premium => "premium",
            Heuristic::Hybrid => "hybrid",
        }
    }
}

/// One way to produce a requirement from a given item state
#[derive(Debug, Clone)]
pub struct StepOption {
    pub action_id: String,
    pub action_name: String,
    pub probability: f64,
    pub cost_per_attempt: f64,
    pub deterministic: bool,
    pub premium: bool,
    /// Projected item after a hit
    pub next_state: ItemState,
}

impl StepOption {
    pub fn cost_per_success(&self) -> f64 {
        self.cost_per_attempt / self.probability.max(f64::MIN_POSITIVE)
    }

    pub fn to_step(&self, required: &RequiredModifier) -> CraftingStep {
        CraftingStep::new(
            self.action_id.clone(),
            format!("{} for {}", self.action_name, required.label()),
            Some(required.clone()),
            self.probability,
            self.cost_per_attempt,
        )
    }
}

fn by_cost_per_success(a: &StepOption, b: &StepOption) -> Ordering {
    a.cost_per_success().total_cmp(&b.cost_per_success())
}

/// Builds candidate strategies from the catalog
pub struct Planner<'a> {
    kb: &'a KnowledgeBase,
    applier: ActionApplier<'a>,
    costs: CostCalculator<'a>,
    tier_boost: TierBoostConfig,
    prefer_deterministic: bool,
}

impl<'a> Planner<'a> {
    pub fn new(
        kb: &'a KnowledgeBase,
        costs: CostCalculator<'a>,
        tier_boost: TierBoostConfig,
        prefer_deterministic: bool,
    ) -> Self {
        Self {
            kb,
            applier: ActionApplier::new(kb),
            costs,
            tier_boost,
            prefer_deterministic,
        }
    }

    /// How `action` would serve `required` from `state`, if it can at all
    fn option_for(&self, action: &CraftingAction, state: &ItemState, required: &RequiredModifier) -> Option<StepOption> {
        if action.category() == ActionCategory::Corrupting || !self.kb.is_applicable(action, state) {
            return None;
        }
        let raw = self.kb.goal_probability(action, state, required);
        if raw <= 0.0 {
            return None;
        }
        let next_state = self.applier.project_targeted(action, state, Some(required))?;
        let deterministic = action.is_deterministic() && raw >= 1.0;
        let probability = if deterministic {
            1.0
        } else {
            self.tier_boost.apply(action.tier, raw)
        };
        Some(StepOption {
            action_id: action.id.clone(),
            action_name: action.name.clone(),
            probability,
            cost_per_attempt: self.costs.action_cost(action),
            deterministic,
            premium: action.is_premium(),
            next_state,
        })
    }

    /// Every action that can produce `required` from `state`
    pub fn options_for(&self, state: &ItemState, required: &RequiredModifier) -> Vec<StepOption> {
        self.kb
            .get_available_actions(state, std::slice::from_ref(required))
            .into_iter()
            .filter_map(|action| self.option_for(action, state, required))
            .collect()
    }

    /// Projected item after every step in `steps` hits
    pub fn project_steps(&self, target: &DesiredItem, steps: &[CraftingStep]) -> CraftResult<ItemState> {
        let mut state = self.applier.project_fresh(&target.base_type, target.item_level)?;
        for step in steps {
            let Some(action) = self.kb.action(&step.action_id) else {
                continue;
            };
            if let Some(next) = self.applier.project_targeted(action, &state, step.target.as_ref()) {
                state = next;
            }
        }
        Ok(state)
    }

    fn step_at(&self, step: &CraftingStep, state: &ItemState) -> CraftingStep {
        let Some(action) = self.kb.action(&step.action_id) else {
            return step.clone();
        };
        let probability = match &step.target {
            Some(required) => self.option_for(action, state, required).map_or(0.0, |o| o.probability),
            None if self.kb.is_applicable(action, state) => 1.0,
            None => 0.0,
        };
        CraftingStep::new(
            action.id.clone(),
            step.description.clone(),
            step.target.clone(),
            probability,
            self.costs.action_cost(action),
        )
    }

    /// Recompute every step's odds and cost along the strategy's own sequence
    pub fn reprice(&self, strategy: &mut Strategy) -> CraftResult<()> {
        let mut state = self.applier.project_fresh(&strategy.target.base_type, strategy.target.item_level)?;
        for step in &mut strategy.steps {
            let mut rebuilt = self.step_at(step, &state);
            if let Some(fallback) = &step.fallback {
                rebuilt = rebuilt.with_fallback(self.step_at(fallback, &state));
            }
            if let Some(action) = self.kb.action(&step.action_id) {
                if let Some(next) = self.applier.project_targeted(action, &state, step.target.as_ref()) {
                    state = next;
                }
            }
            *step = rebuilt;
        }
        Ok(())
    }

    /// Order options best-first for a heuristic
    pub fn rank(&self, heuristic: Heuristic, requirement_index: usize, options: &mut [StepOption]) {
        let effective = match heuristic {
            Heuristic::Hybrid if requirement_index % 2 == 0 => Heuristic::DeterministicFirst,
            Heuristic::Hybrid => Heuristic::Budget,
            other => other,
        };
        match effective {
            Heuristic::DeterministicFirst => options.sort_by(|a, b| {
                b.deterministic
                    .cmp(&a.deterministic)
                    .then(b.probability.total_cmp(&a.probability))
                    .then(by_cost_per_success(a, b))
            }),
            Heuristic::Budget => options.sort_by(|a, b| {
                a.cost_per_attempt
                    .total_cmp(&b.cost_per_attempt)
                    .then(by_cost_per_success(a, b))
            }),
            Heuristic::Premium => options.sort_by(by_cost_per_success),
            Heuristic::Hybrid => {}
        }

        if self.prefer_deterministic && !options.is_empty() {
            let best = options[0].cost_per_success();
            if let Some(pos) = options
                .iter()
                .position(|o| o.deterministic && o.cost_per_success() <= best * DETERMINISTIC_SLACK)
            {
                options[..=pos].rotate_right(1);
            }
        }
    }

    /// Cheapest applicable action that raises rarity, as a setup step
    fn setup_step(&self, state: &ItemState) -> Option<(CraftingStep, ItemState)> {
        let raises = |action: &CraftingAction| {
            action.outcomes.all_ops().into_iter().any(|op| match op {
                Op::SetRarity(rarity) => *rarity > state.rarity,
                _ => false,
            })
        };
        let action = self
            .kb
            .get_available_actions(state, &[])
            .into_iter()
            .filter(|a| a.category() != ActionCategory::Corrupting && raises(a))
            .min_by(|a, b| self.costs.action_cost(a).total_cmp(&self.costs.action_cost(b)))?;
        let next = self.applier.project_targeted(action, state, None)?;
        let step = CraftingStep::new(
            action.id.clone(),
            format!("{} to make the item {}", action.name, next.rarity.name()),
            None,
            1.0,
            self.costs.action_cost(action),
        );
        Some((step, next))
    }

    /// Build one strategy, or None when some requirement cannot be planned
    pub fn plan(&self, target: &DesiredItem, heuristic: Heuristic) -> CraftResult<Option<Strategy>> {
        let mut state = self.applier.project_fresh(&target.base_type, target.item_level)?;
        let mut order: Vec<&RequiredModifier> = target.required.iter().collect();
        order.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let mut steps = Vec::new();
        for (index, required) in order.into_iter().enumerate() {
            if state.has_match(required) {
                continue;
            }
            let mut setups = 0;
            loop {
                let mut options = self.options_for(&state, required);
                if heuristic == Heuristic::Premium {
                    options.retain(|o| o.premium);
                }
                if !options.is_empty() {
                    self.rank(heuristic, index, &mut options);
                    let mut step = options[0].to_step(required);
                    if let Some(runner_up) = options.get(1) {
                        step = step.with_fallback(runner_up.to_step(required));
                    }
                    state = options.swap_remove(0).next_state;
                    steps.push(step);
                    break;
                }
                if setups >= MAX_SETUP_STEPS {
                    log::debug!(
                        "{}: no action reaches '{}' from {}",
                        heuristic.name(),
                        required.label(),
                        state.summary()
                    );
                    return Ok(None);
                }
                let Some((step, next)) = self.setup_step(&state) else {
                    return Ok(None);
                };
                steps.push(step);
                state = next;
                setups += 1;
            }
        }

        Ok(Some(Strategy::new(heuristic.name(), target.clone(), steps)))
    }
}

impl StepSource for Planner<'_> {
    fn alternatives(&self, strategy: &Strategy, index: usize) -> CraftResult<Vec<CraftingStep>> {
        let Some(required) = strategy.steps.get(index).and_then(|s| s.target.as_ref()) else {
            return Ok(Vec::new());
        };
        let state = self.project_steps(&strategy.target, &strategy.steps[..index])?;
        Ok(self
            .options_for(&state, required)
            .iter()
            .map(|o| o.to_step(required))
            .collect())
    }

    fn reprice(&self, strategy: &mut Strategy) -> CraftResult<()> {
        Planner::reprice(self, strategy)
    }
}
