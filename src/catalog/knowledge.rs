//! Knowledge base
//!
//! Validated, read-only view over a crafting catalog. Built once per process
//! and shared by reference; answers every "what can this action do to this
//! item" question the applier, simulator and optimizer ask.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::action::{
    ActionCategory, ActionOutcomes, CostDescriptor, CraftingAction, Currency, Op, Outcome,
    SideFilter,
};
use super::modifier::{AffixSlot, ItemBase, Modifier, ModifierPool, PoolSide};
use crate::error::{CraftError, CraftResult};
use crate::items::{ItemState, RolledModifier};
use crate::strategy::RequiredModifier;

/// Price used for costs the catalog has no currency entry for
pub const UNKNOWN_CURRENCY_VALUE: f64 = 1.0;

/// Raw catalog contents, as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub currencies: Vec<Currency>,
    pub bases: Vec<ItemBase>,
    pub modifiers: Vec<Modifier>,
    pub actions: Vec<CraftingAction>,
    /// Item levels a modifier pool is precomputed at for every base
    pub pool_levels: Vec<u32>,
}

/// Validated catalog with precomputed modifier pools
#[derive(Debug)]
pub struct KnowledgeBase {
    currencies: HashMap<String, Currency>,
    bases: HashMap<String, ItemBase>,
    modifiers: Vec<Arc<Modifier>>,
    modifier_index: HashMap<String, Arc<Modifier>>,
    actions: Vec<CraftingAction>,
    pools: HashMap<String, BTreeMap<u32, ModifierPool>>,
}

impl KnowledgeBase {
    /// Validate a catalog and build its modifier pools
    pub fn new(catalog: Catalog) -> CraftResult<Self> {
        let Catalog {
            currencies,
            bases,
            modifiers,
            actions,
            pool_levels,
        } = catalog;

        if pool_levels.is_empty() {
            return Err(CraftError::Catalog("no pool levels declared".to_string()));
        }

        let mut modifier_index = HashMap::new();
        let mut shared = Vec::with_capacity(modifiers.len());
        for modifier in modifiers {
            if modifier.values.iter().any(|r| r.min > r.max) {
                return Err(CraftError::Catalog(format!(
                    "modifier {} has an empty value range",
                    modifier.id
                )));
            }
            if modifier
                .affinities
                .iter()
                .any(|a| !a.multiplier.is_finite() || a.multiplier < 0.0)
            {
                return Err(CraftError::Catalog(format!(
                    "modifier {} has a negative or non-finite affinity multiplier",
                    modifier.id
                )));
            }
            let modifier = Arc::new(modifier);
            if modifier_index
                .insert(modifier.id.clone(), Arc::clone(&modifier))
                .is_some()
            {
                return Err(CraftError::Catalog(format!(
                    "duplicate modifier id {}",
                    modifier.id
                )));
            }
            shared.push(modifier);
        }

        if let Some(bad) = currencies
            .iter()
            .find(|c| !c.reference_value.is_finite() || c.reference_value < 0.0)
        {
            return Err(CraftError::Catalog(format!(
                "currency {} has a negative or non-finite reference value",
                bad.id
            )));
        }

        let currencies: HashMap<String, Currency> = currencies
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        for base in &bases {
            if let Some(implicit) = &base.implicit {
                if !modifier_index.contains_key(implicit) {
                    return Err(CraftError::Catalog(format!(
                        "base {} references unknown implicit {}",
                        base.id, implicit
                    )));
                }
            }
        }

        for action in &actions {
            Self::validate_action(action, &modifier_index, &currencies)?;
        }

        let mut pools: HashMap<String, BTreeMap<u32, ModifierPool>> = HashMap::new();
        for base in &bases {
            let levels = pools.entry(base.id.clone()).or_default();
            for &level in &pool_levels {
                levels.insert(level, ModifierPool::build(base, level, &shared));
            }
        }

        let bases = bases.into_iter().map(|b| (b.id.clone(), b)).collect();

        let kb = Self {
            currencies,
            bases,
            modifiers: shared,
            modifier_index,
            actions,
            pools,
        };
        log::info!(
            "Knowledge base ready: {} bases, {} modifiers, {} actions",
            kb.bases.len(),
            kb.modifiers.len(),
            kb.actions.len()
        );
        Ok(kb)
    }

    fn validate_action(
        action: &CraftingAction,
        modifiers: &HashMap<String, Arc<Modifier>>,
        currencies: &HashMap<String, Currency>,
    ) -> CraftResult<()> {
        let fail = |msg: String| Err(CraftError::Catalog(format!("action {}: {}", action.id, msg)));

        match &action.outcomes {
            ActionOutcomes::Deterministic(outcome) => {
                if outcome.ops.iter().any(Op::is_random_addition) {
                    return fail("deterministic outcome draws a random modifier".to_string());
                }
            }
            ActionOutcomes::Weighted(list) | ActionOutcomes::Corrupting(list) => {
                if list.iter().any(|w| !w.weight.is_finite() || w.weight < 0.0) {
                    return fail("negative or non-finite outcome weight".to_string());
                }
                if list.iter().all(|w| w.weight <= 0.0) {
                    return fail("no outcome with positive weight".to_string());
                }
            }
        }

        for op in action.outcomes.all_ops() {
            if let Op::AddSpecific(id) | Op::SetImplicit(id) = op {
                if !modifiers.contains_key(id) {
                    return fail(format!("unknown modifier {}", id));
                }
            }
        }

        if let CostDescriptor::Currency(amounts) = &action.cost {
            for amount in amounts {
                if !currencies.contains_key(&amount.currency) {
                    return fail(format!("unknown currency {}", amount.currency));
                }
            }
        }
        Ok(())
    }

    /// Look up an item base, falling back to a case-insensitive match
    pub fn base(&self, id: &str) -> CraftResult<&ItemBase> {
        self.bases
            .get(id)
            .or_else(|| self.bases.values().find(|b| b.id.eq_ignore_ascii_case(id)))
            .ok_or_else(|| CraftError::UnknownBase(id.to_string()))
    }

    pub fn bases(&self) -> impl Iterator<Item = &ItemBase> {
        self.bases.values()
    }

    pub fn modifier(&self, id: &str) -> Option<&Arc<Modifier>> {
        self.modifier_index.get(id)
    }

    pub fn modifiers(&self) -> &[Arc<Modifier>] {
        &self.modifiers
    }

    pub fn action(&self, id: &str) -> Option<&CraftingAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    pub fn actions(&self) -> &[CraftingAction] {
        &self.actions
    }

    pub fn currency(&self, id: &str) -> Option<&Currency> {
        self.currencies.get(id)
    }

    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }

    /// Pool for the nearest registered level at or below `level`
    pub fn get_modifier_pool(&self, base: &str, level: u32) -> CraftResult<&ModifierPool> {
        let not_found = || CraftError::PoolNotFound {
            base: base.to_string(),
            level,
        };
        let base_id = self.base(base).map_err(|_| not_found())?.id.as_str();
        let levels = self.pools.get(base_id).ok_or_else(not_found)?;
        levels
            .range(..=level)
            .next_back()
            .map(|(_, pool)| pool)
            .ok_or_else(not_found)
    }

    fn base_tags(&self, state: &ItemState) -> &[String] {
        self.base(&state.base).map(|b| b.tags.as_slice()).unwrap_or(&[])
    }

    /// Whether an action may be used on the item right now
    pub fn is_applicable(&self, action: &CraftingAction, state: &ItemState) -> bool {
        if state.corrupted && action.category() != ActionCategory::Corrupting {
            return false;
        }
        action.requirement.is_met(state, self.base_tags(state))
    }

    /// Applicable actions, most relevant to the target modifiers first
    pub fn get_available_actions(
        &self,
        state: &ItemState,
        target: &[RequiredModifier],
    ) -> Vec<&CraftingAction> {
        let resolved = self.resolve_modifiers(target);
        let target_tags: HashSet<&str> = resolved
            .iter()
            .flat_map(|m| m.tags.iter().map(String::as_str))
            .collect();

        let mut scored: Vec<(f64, f64, &CraftingAction)> = self
            .actions
            .iter()
            .filter(|a| self.is_applicable(a, state))
            .map(|a| (self.relevance(a, &target_tags), self.nominal_cost(a), a))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.total_cmp(&b.1)));
        scored.into_iter().map(|(_, _, a)| a).collect()
    }

    fn relevance(&self, action: &CraftingAction, target_tags: &HashSet<&str>) -> f64 {
        let mut tags: HashSet<&str> = action.tags.iter().map(String::as_str).collect();
        for op in action.outcomes.all_ops() {
            match op {
                Op::AddRandom { tags: filter, .. } => {
                    tags.extend(filter.iter().map(String::as_str));
                }
                Op::AddSpecific(id) | Op::SetImplicit(id) => {
                    if let Some(m) = self.modifier(id) {
                        tags.extend(m.tags.iter().map(String::as_str));
                    }
                }
                _ => {}
            }
        }
        let overlap = tags.intersection(target_tags).count() as f64;
        let bonus = if action.is_deterministic() { 0.5 } else { 0.0 };
        overlap + bonus
    }

    /// Cost of one use at catalog reference values
    pub fn nominal_cost(&self, action: &CraftingAction) -> f64 {
        action
            .cost
            .materials()
            .into_iter()
            .map(|(key, qty)| {
                let unit = self
                    .currency(key)
                    .map_or(UNKNOWN_CURRENCY_VALUE, |c| c.reference_value);
                unit * qty
            })
            .sum()
    }

    /// Catalog modifiers whose text or id matches any required modifier
    pub fn resolve_modifiers(&self, required: &[RequiredModifier]) -> Vec<Arc<Modifier>> {
        self.modifiers
            .iter()
            .filter(|m| required.iter().any(|r| r.matches_text(m)))
            .cloned()
            .collect()
    }

    /// Pool entries an `AddRandom` could draw on this item: sides with an
    /// open slot, groups not already present, and the tier/tag filters.
    pub fn eligible_pool(
        &self,
        state: &ItemState,
        side: SideFilter,
        max_tier: Option<u8>,
        tags: &[String],
    ) -> CraftResult<PoolSide> {
        let pool = self.get_modifier_pool(&state.base, state.item_level)?;
        let mut merged = PoolSide::default();
        for slot in [AffixSlot::Prefix, AffixSlot::Suffix] {
            if !side.allows(slot) || !state.has_open_slot(slot) {
                continue;
            }
            if let Some(entries) = pool.side(slot) {
                merged = merged.merged(entries);
            }
        }
        Ok(merged.filtered(|e| {
            e.modifier.required_level <= state.item_level
                && !state.has_group(&e.modifier.group)
                && max_tier.map_or(true, |t| e.modifier.tier <= t)
                && (tags.is_empty() || tags.iter().any(|t| e.modifier.has_tag(t)))
        }))
    }

    /// Probability that one use of `action` on `state` leaves a modifier
    /// matching `required` on the item.
    pub fn goal_probability(
        &self,
        action: &CraftingAction,
        state: &ItemState,
        required: &RequiredModifier,
    ) -> f64 {
        if !self.is_applicable(action, state) {
            return 0.0;
        }
        action
            .outcomes
            .distribution()
            .into_iter()
            .map(|(p, outcome)| p * self.ops_hit_probability(&outcome.ops, state, required))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    /// Hit probability of one specific outcome, ignoring its weight
    pub fn outcome_hit_probability(
        &self,
        outcome: &Outcome,
        state: &ItemState,
        required: &RequiredModifier,
    ) -> f64 {
        self.ops_hit_probability(&outcome.ops, state, required)
            .clamp(0.0, 1.0)
    }

    fn ops_hit_probability(&self, ops: &[Op], state: &ItemState, required: &RequiredModifier) -> f64 {
        let Some((op, rest)) = ops.split_first() else {
            return 0.0;
        };
        let combine = |hit: f64, rest_hit: f64| 1.0 - (1.0 - hit) * (1.0 - rest_hit);

        match op {
            Op::AddRandom { side, max_tier, tags } => {
                let pool = match self.eligible_pool(state, *side, *max_tier, tags) {
                    Ok(pool) if !pool.is_empty() => pool,
                    _ => return self.ops_hit_probability(rest, state, required),
                };
                let hit_weight: f64 = pool
                    .entries
                    .iter()
                    .filter(|e| required.matches_text(&e.modifier))
                    .map(|e| e.weight * required.value_fraction(&e.modifier))
                    .sum();
                let hit = (hit_weight / pool.total_weight).clamp(0.0, 1.0);

                // The most likely miss stands in for whatever filled the slot
                let mut after_miss = state.clone();
                if let Some(miss) = pool
                    .entries
                    .iter()
                    .filter(|e| !required.matches_text(&e.modifier))
                    .max_by(|a, b| a.weight.total_cmp(&b.weight))
                {
                    let values = miss.modifier.values.iter().map(|r| r.min).collect();
                    after_miss.add_affix(RolledModifier::new(Arc::clone(&miss.modifier), values));
                }
                combine(hit, self.ops_hit_probability(rest, &after_miss, required))
            }
            Op::AddSpecific(id) | Op::SetImplicit(id) => {
                let Some(modifier) = self.modifier(id) else {
                    return self.ops_hit_probability(rest, state, required);
                };
                let mut next = state.clone();
                let values: Vec<i32> = modifier.values.iter().map(|r| r.min).collect();
                let rolled = RolledModifier::new(Arc::clone(modifier), values);
                let fits = if matches!(op, Op::SetImplicit(_)) {
                    next.implicit = Some(rolled);
                    true
                } else {
                    next.add_affix(rolled)
                };
                let hit = if fits && required.matches_text(modifier) {
                    required.value_fraction(modifier)
                } else {
                    0.0
                };
                combine(hit, self.ops_hit_probability(rest, &next, required))
            }
            Op::SetRarity(rarity) => {
                let mut next = state.clone();
                next.rarity = *rarity;
                next.truncate_to_cap();
                self.ops_hit_probability(rest, &next, required)
            }
            Op::RemoveRandom => {
                let count = state.affix_count();
                if count == 0 {
                    return self.ops_hit_probability(rest, state, required);
                }
                (0..count)
                    .map(|i| {
                        let mut next = state.clone();
                        next.remove_affix(i);
                        self.ops_hit_probability(rest, &next, required)
                    })
                    .sum::<f64>()
                    / count as f64
            }
            Op::ClearAffixes => {
                let mut next = state.clone();
                next.clear_affixes();
                self.ops_hit_probability(rest, &next, required)
            }
            Op::RerollValues => {
                let hit = state
                    .all_modifiers()
                    .filter(|m| required.matches_text(&m.modifier))
                    .map(|m| required.value_fraction(&m.modifier))
                    .fold(0.0, f64::max);
                combine(hit, self.ops_hit_probability(rest, state, required))
            }
            Op::AddQuality(_) => self.ops_hit_probability(rest, state, required),
            Op::Corrupt => {
                let mut next = state.clone();
                next.corrupted = true;
                self.ops_hit_probability(rest, &next, required)
            }
        }
    }

    /// Whether some catalog action could ever put `required` on the base
    pub fn can_produce(&self, base: &str, level: u32, required: &RequiredModifier) -> bool {
        let Ok(pool) = self.get_modifier_pool(base, level) else {
            return false;
        };
        self.actions.iter().any(|action| {
            action.outcomes.all_ops().into_iter().any(|op| match op {
                Op::AddRandom { side, max_tier, tags } => pool.entries().any(|e| {
                    side.allows(e.modifier.slot)
                        && max_tier.map_or(true, |t| e.modifier.tier <= t)
                        && (tags.is_empty() || tags.iter().any(|t| e.modifier.has_tag(t)))
                        && required.matches_text(&e.modifier)
                        && required.value_fraction(&e.modifier) > 0.0
                }),
                Op::AddSpecific(id) | Op::SetImplicit(id) => self.modifier(id).is_some_and(|m| {
                    m.required_level <= level
                        && required.matches_text(m)
                        && required.value_fraction(m) > 0.0
                }),
                _ => false,
            })
        })
    }

    /// Labels of required modifiers no action can produce
    pub fn unmet_requirements(&self, base: &str, level: u32, required: &[RequiredModifier]) -> Vec<String> {
        required
            .iter()
            .filter(|r| !self.can_produce(base, level, r))
            .map(|r| r.label())
            .collect()
    }
}
