//! Action application
//!
//! Pure transformations of an `ItemState` by a crafting action. The input
//! state is never touched; every call returns a new state that still holds
//! the slot-cap and affix-group invariants.

use std::sync::Arc;

use rand::Rng;

use super::item::{ItemState, RolledModifier, MAX_QUALITY};
use crate::catalog::{
    ActionOutcomes, CraftingAction, KnowledgeBase, Modifier, Op, Outcome, PoolSide,
};
use crate::error::{CraftError, CraftResult};
use crate::strategy::RequiredModifier;

/// Sample one entry from a pool side and roll its values.
/// Returns None when the side is empty.
pub fn roll_modifier(side: &PoolSide, rng: &mut impl Rng) -> Option<RolledModifier> {
    if side.is_empty() {
        return None;
    }
    let roll = rng.gen_range(0.0..side.total_weight);
    let mut cumulative = 0.0;
    let mut chosen = None;
    for entry in &side.entries {
        cumulative += entry.weight;
        if roll < cumulative {
            chosen = Some(entry);
            break;
        }
    }
    // Float rounding can leave the roll just past the last bucket
    let entry = chosen.or_else(|| side.entries.iter().rev().find(|e| e.weight > 0.0))?;
    let values = roll_values(&entry.modifier, rng);
    Some(RolledModifier::new(Arc::clone(&entry.modifier), values))
}

/// Roll every value range of a modifier uniformly, inclusive
pub fn roll_values(modifier: &Modifier, rng: &mut impl Rng) -> Vec<i32> {
    modifier
        .values
        .iter()
        .map(|r| rng.gen_range(r.min..=r.max))
        .collect()
}

/// Roll values with the first range constrained to the required bounds
fn roll_values_within(modifier: &Modifier, required: &RequiredModifier, rng: &mut impl Rng) -> Vec<i32> {
    let (lower, upper) = required.bounds();
    modifier
        .values
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let range = if i == 0 {
                r.clamp_to(lower, upper).unwrap_or(*r)
            } else {
                *r
            };
            rng.gen_range(range.min..=range.max)
        })
        .collect()
}

fn pick_outcome<'o>(outcomes: &'o ActionOutcomes, rng: &mut impl Rng) -> Option<&'o Outcome> {
    let dist = outcomes.distribution();
    if dist.len() == 1 {
        return dist.first().map(|(_, o)| *o);
    }
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (p, outcome) in &dist {
        cumulative += p;
        if roll < cumulative {
            return Some(*outcome);
        }
    }
    dist.last().map(|(_, o)| *o)
}

/// Applies catalog actions to item states
#[derive(Debug, Clone, Copy)]
pub struct ActionApplier<'a> {
    kb: &'a KnowledgeBase,
}

impl<'a> ActionApplier<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self { kb }
    }

    /// A fresh Normal item of `base`, with its implicit rolled
    pub fn fresh_item(&self, base: &str, item_level: u32, rng: &mut impl Rng) -> CraftResult<ItemState> {
        let base = self.kb.base(base)?;
        let mut item = ItemState::new(base.id.clone(), item_level);
        if let Some(implicit) = &base.implicit {
            let modifier = self.lookup(implicit)?;
            let values = roll_values(modifier, rng);
            item.implicit = Some(RolledModifier::new(Arc::clone(modifier), values));
        }
        Ok(item)
    }

    /// A fresh item with its implicit at the lowest values, for planning
    pub fn project_fresh(&self, base: &str, item_level: u32) -> CraftResult<ItemState> {
        let base = self.kb.base(base)?;
        let mut item = ItemState::new(base.id.clone(), item_level);
        if let Some(implicit) = &base.implicit {
            let modifier = self.lookup(implicit)?;
            let values = modifier.values.iter().map(|r| r.min).collect();
            item.implicit = Some(RolledModifier::new(Arc::clone(modifier), values));
        }
        Ok(item)
    }

    fn lookup(&self, id: &str) -> CraftResult<&'a Arc<Modifier>> {
        self.kb
            .modifier(id)
            .ok_or_else(|| CraftError::Catalog(format!("unknown modifier {}", id)))
    }

    /// Sample one outcome of the action and apply it to a copy of `state`.
    /// An action that is not applicable leaves the state unchanged.
    pub fn apply(
        &self,
        action: &CraftingAction,
        state: &ItemState,
        rng: &mut impl Rng,
    ) -> CraftResult<ItemState> {
        let mut next = state.clone();
        if !self.kb.is_applicable(action, state) {
            return Ok(next);
        }
        if let Some(outcome) = pick_outcome(&action.outcomes, rng) {
            for op in &outcome.ops {
                self.apply_op(op, &mut next, rng)?;
            }
        }
        Ok(next)
    }

    fn apply_op(&self, op: &Op, state: &mut ItemState, rng: &mut impl Rng) -> CraftResult<()> {
        match op {
            Op::SetRarity(rarity) => {
                state.rarity = *rarity;
                state.truncate_to_cap();
            }
            Op::AddRandom { side, max_tier, tags } => {
                let pool = self.kb.eligible_pool(state, *side, *max_tier, tags)?;
                if let Some(rolled) = roll_modifier(&pool, rng) {
                    state.add_affix(rolled);
                }
            }
            Op::AddSpecific(id) => {
                let modifier = self.lookup(id)?;
                let values = roll_values(modifier, rng);
                state.add_affix(RolledModifier::new(Arc::clone(modifier), values));
            }
            Op::RemoveRandom => {
                let count = state.affix_count();
                if count > 0 {
                    state.remove_affix(rng.gen_range(0..count));
                }
            }
            Op::ClearAffixes => state.clear_affixes(),
            Op::RerollValues => {
                for rolled in state
                    .prefixes
                    .iter_mut()
                    .chain(state.suffixes.iter_mut())
                    .chain(state.implicit.iter_mut())
                {
                    rolled.values = roll_values(&rolled.modifier, rng);
                }
            }
            Op::SetImplicit(id) => {
                let modifier = self.lookup(id)?;
                let clashes = state.affixes().any(|m| m.group() == modifier.group);
                if !clashes {
                    let values = roll_values(modifier, rng);
                    state.implicit = Some(RolledModifier::new(Arc::clone(modifier), values));
                }
            }
            Op::AddQuality(amount) => {
                state.quality = state.quality.saturating_add(*amount).min(MAX_QUALITY);
            }
            Op::Corrupt => state.corrupted = true,
        }
        Ok(())
    }

    /// Apply the action conditioned on it producing `required`.
    ///
    /// The outcome is drawn with weights proportional to how often it can hit,
    /// the hitting draw is restricted to matching pool entries with values
    /// inside the required bounds, and any other draws roll normally. Returns
    /// None when the item has no structural room for the modifier.
    pub fn apply_targeted(
        &self,
        action: &CraftingAction,
        state: &ItemState,
        required: &RequiredModifier,
        rng: &mut impl Rng,
    ) -> CraftResult<Option<ItemState>> {
        if !self.kb.is_applicable(action, state) {
            return Ok(None);
        }

        let candidates: Vec<(f64, &Outcome)> = action
            .outcomes
            .distribution()
            .into_iter()
            .map(|(p, outcome)| (p * self.kb.outcome_hit_probability(outcome, state, required), outcome))
            .filter(|(w, _)| *w > 0.0)
            .collect();
        let total: f64 = candidates.iter().map(|(w, _)| w).sum();
        if total <= 0.0 {
            return Ok(None);
        }

        let roll = rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        let mut outcome = candidates[candidates.len() - 1].1;
        for (w, candidate) in &candidates {
            cumulative += w;
            if roll < cumulative {
                outcome = *candidate;
                break;
            }
        }

        let mut next = state.clone();
        let mut hit = false;
        for op in &outcome.ops {
            if hit {
                self.apply_op(op, &mut next, rng)?;
                continue;
            }
            match op {
                Op::AddRandom { side, max_tier, tags } => {
                    let pool = self.kb.eligible_pool(&next, *side, *max_tier, tags)?;
                    let matching = pool.filtered(|e| {
                        required.matches_text(&e.modifier) && required.value_fraction(&e.modifier) > 0.0
                    });
                    match roll_modifier(&matching, rng) {
                        Some(rolled) => {
                            let values = roll_values_within(&rolled.modifier, required, rng);
                            hit = next.add_affix(RolledModifier::new(rolled.modifier, values));
                        }
                        None => {
                            if let Some(rolled) = roll_modifier(&pool, rng) {
                                next.add_affix(rolled);
                            }
                        }
                    }
                }
                Op::AddSpecific(id) => {
                    let modifier = self.lookup(id)?;
                    let values = if required.matches_text(modifier) {
                        roll_values_within(modifier, required, rng)
                    } else {
                        roll_values(modifier, rng)
                    };
                    next.add_affix(RolledModifier::new(Arc::clone(modifier), values));
                    hit = next.has_match(required);
                }
                Op::RerollValues => {
                    self.apply_op(op, &mut next, rng)?;
                    for rolled in next
                        .prefixes
                        .iter_mut()
                        .chain(next.suffixes.iter_mut())
                        .chain(next.implicit.iter_mut())
                    {
                        if required.matches_text(&rolled.modifier) {
                            rolled.values = roll_values_within(&rolled.modifier, required, rng);
                        }
                    }
                    hit = next.has_match(required);
                }
                Op::RemoveRandom => {
                    // Keep a modifier that already matches
                    let removable: Vec<usize> = next
                        .affixes()
                        .enumerate()
                        .filter(|(_, m)| !m.matches(required))
                        .map(|(i, _)| i)
                        .collect();
                    if !removable.is_empty() {
                        next.remove_affix(removable[rng.gen_range(0..removable.len())]);
                    }
                }
                _ => {
                    self.apply_op(op, &mut next, rng)?;
                    hit = next.has_match(required);
                }
            }
        }

        Ok(next.has_match(required).then_some(next))
    }

    /// Expected shape of the item after a successful targeted use, without
    /// any randomness: the best-weighted matching modifier at the lowest
    /// accepted values, and no filler modifiers. Used for planning.
    pub fn project_targeted(
        &self,
        action: &CraftingAction,
        state: &ItemState,
        required: Option<&RequiredModifier>,
    ) -> Option<ItemState> {
        if !self.kb.is_applicable(action, state) {
            return None;
        }
        let outcome = match required {
            Some(req) => action
                .outcomes
                .distribution()
                .into_iter()
                .map(|(p, outcome)| (p * self.kb.outcome_hit_probability(outcome, state, req), outcome))
                .filter(|(w, _)| *w > 0.0)
                .max_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, o)| o)?,
            None => action
                .outcomes
                .distribution()
                .into_iter()
                .max_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, o)| o)?,
        };

        let mut next = state.clone();
        let mut hit = false;
        for op in &outcome.ops {
            match op {
                Op::SetRarity(rarity) => {
                    next.rarity = *rarity;
                    next.truncate_to_cap();
                }
                Op::AddRandom { side, max_tier, tags } if !hit => {
                    let Some(req) = required else { continue };
                    let pool = self.kb.eligible_pool(&next, *side, *max_tier, tags).ok()?;
                    let best = pool
                        .entries
                        .iter()
                        .filter(|e| req.matches_text(&e.modifier) && req.value_fraction(&e.modifier) > 0.0)
                        .max_by(|a, b| a.weight.total_cmp(&b.weight));
                    if let Some(entry) = best {
                        let values = projected_values(&entry.modifier, req);
                        hit = next.add_affix(RolledModifier::new(Arc::clone(&entry.modifier), values));
                    }
                }
                Op::AddSpecific(id) | Op::SetImplicit(id) => {
                    let modifier = self.kb.modifier(id)?;
                    let values = match required {
                        Some(req) if req.matches_text(modifier) => projected_values(modifier, req),
                        _ => modifier.values.iter().map(|r| r.min).collect(),
                    };
                    let rolled = RolledModifier::new(Arc::clone(modifier), values);
                    if matches!(op, Op::SetImplicit(_)) {
                        next.implicit = Some(rolled);
                    } else {
                        next.add_affix(rolled);
                    }
                    hit = required.is_some_and(|r| next.has_match(r));
                }
                Op::ClearAffixes => next.clear_affixes(),
                Op::AddQuality(amount) => {
                    next.quality = next.quality.saturating_add(*amount).min(MAX_QUALITY);
                }
                Op::Corrupt => next.corrupted = true,
                Op::AddRandom { .. } | Op::RemoveRandom | Op::RerollValues => {}
            }
        }

        match required {
            Some(req) if !next.has_match(req) => None,
            _ => Some(next),
        }
    }
}

fn projected_values(modifier: &Modifier, required: &RequiredModifier) -> Vec<i32> {
    let (lower, upper) = required.bounds();
    modifier
        .values
        .iter()
        .enumerate()
        .map(|(i, r)| match (i, r.clamp_to(lower, upper)) {
            (0, Some(clamped)) => clamped.min,
            _ => r.min,
        })
        .collect()
}
