//! Crafting actions
//!
//! An action is a currency (or other crafting material) use: a requirement
//! predicate over the item, a set of outcomes, and a cost.

use serde::{Deserialize, Serialize};

use super::modifier::AffixSlot;
use crate::items::{ItemState, Rarity};

/// Broad behaviour class of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCategory {
    /// Exactly one guaranteed outcome
    Deterministic,
    /// Weighted random outcomes
    Probabilistic,
    /// Corrupts the item; the only class allowed on corrupted items
    Corrupting,
}

/// Currency grade; higher grades restrict to better modifier tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum CurrencyTier {
    #[default]
    Basic,
    Greater,
    Perfect,
}

/// Which side an action needs a free slot on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotRequirement {
    Prefix,
    Suffix,
    Either,
}

/// Requirement predicate evaluated against an item before an action applies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Requirement {
    /// Allowed rarities (empty = any)
    #[serde(default)]
    pub rarities: Vec<Rarity>,
    #[serde(default)]
    pub open_slot: Option<SlotRequirement>,
    /// Tags the item base must carry
    #[serde(default)]
    pub required_tags: Vec<String>,
    #[serde(default)]
    pub min_item_level: u32,
    /// Item must already hold at least one affix
    #[serde(default)]
    pub needs_affix: bool,
    /// Item quality must be below this value
    #[serde(default)]
    pub quality_below: Option<u8>,
}

impl Requirement {
    pub fn rarity(rarities: &[Rarity]) -> Self {
        Self {
            rarities: rarities.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_open_slot(mut self, slot: SlotRequirement) -> Self {
        self.open_slot = Some(slot);
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.required_tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_min_level(mut self, level: u32) -> Self {
        self.min_item_level = level;
        self
    }

    pub fn needing_affix(mut self) -> Self {
        self.needs_affix = true;
        self
    }

    /// Evaluate against an item whose base carries `base_tags`
    pub fn is_met(&self, state: &ItemState, base_tags: &[String]) -> bool {
        if !self.rarities.is_empty() && !self.rarities.contains(&state.rarity) {
            return false;
        }
        if state.item_level < self.min_item_level {
            return false;
        }
        if !self
            .required_tags
            .iter()
            .all(|tag| base_tags.iter().any(|t| t == tag))
        {
            return false;
        }
        if self.needs_affix && state.affix_count() == 0 {
            return false;
        }
        if let Some(limit) = self.quality_below {
            if state.quality >= limit {
                return false;
            }
        }
        match self.open_slot {
            None => true,
            Some(SlotRequirement::Prefix) => state.has_open_slot(AffixSlot::Prefix),
            Some(SlotRequirement::Suffix) => state.has_open_slot(AffixSlot::Suffix),
            Some(SlotRequirement::Either) => {
                state.has_open_slot(AffixSlot::Prefix) || state.has_open_slot(AffixSlot::Suffix)
            }
        }
    }
}

/// Which pool side a random addition draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideFilter {
    Prefix,
    Suffix,
    Any,
}

impl SideFilter {
    pub fn allows(&self, slot: AffixSlot) -> bool {
        match self {
            SideFilter::Prefix => slot == AffixSlot::Prefix,
            SideFilter::Suffix => slot == AffixSlot::Suffix,
            SideFilter::Any => slot != AffixSlot::Implicit,
        }
    }
}

/// One structural change to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    SetRarity(Rarity),
    /// Roll a modifier from the item's pool
    AddRandom {
        side: SideFilter,
        /// Only tiers numerically <= this (1 = best)
        #[serde(default)]
        max_tier: Option<u8>,
        /// Only modifiers carrying one of these tags
        #[serde(default)]
        tags: Vec<String>,
    },
    /// Add one specific catalog modifier
    AddSpecific(String),
    RemoveRandom,
    ClearAffixes,
    /// Reroll the values of every modifier
    RerollValues,
    SetImplicit(String),
    AddQuality(u8),
    Corrupt,
}

impl Op {
    pub fn add_random(side: SideFilter) -> Self {
        Op::AddRandom {
            side,
            max_tier: None,
            tags: Vec::new(),
        }
    }

    pub fn add_random_tiered(side: SideFilter, max_tier: u8) -> Self {
        Op::AddRandom {
            side,
            max_tier: Some(max_tier),
            tags: Vec::new(),
        }
    }

    /// Whether this op draws from the random modifier pool
    pub fn is_random_addition(&self) -> bool {
        matches!(self, Op::AddRandom { .. })
    }
}

/// A labelled list of ops applied in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub label: String,
    pub ops: Vec<Op>,
}

impl Outcome {
    pub fn new(label: impl Into<String>, ops: Vec<Op>) -> Self {
        Self {
            label: label.into(),
            ops,
        }
    }
}

/// An outcome with its relative weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedOutcome {
    pub weight: f64,
    pub outcome: Outcome,
}

/// Outcome set, tagged by action category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionOutcomes {
    Deterministic(Outcome),
    Weighted(Vec<WeightedOutcome>),
    Corrupting(Vec<WeightedOutcome>),
}

impl ActionOutcomes {
    pub fn category(&self) -> ActionCategory {
        match self {
            ActionOutcomes::Deterministic(_) => ActionCategory::Deterministic,
            ActionOutcomes::Weighted(_) => ActionCategory::Probabilistic,
            ActionOutcomes::Corrupting(_) => ActionCategory::Corrupting,
        }
    }

    /// Every outcome with its normalised probability
    pub fn distribution(&self) -> Vec<(f64, &Outcome)> {
        match self {
            ActionOutcomes::Deterministic(outcome) => vec![(1.0, outcome)],
            ActionOutcomes::Weighted(list) | ActionOutcomes::Corrupting(list) => {
                let total: f64 = list.iter().map(|w| w.weight.max(0.0)).sum();
                if total <= 0.0 {
                    return Vec::new();
                }
                list.iter()
                    .map(|w| (w.weight.max(0.0) / total, &w.outcome))
                    .collect()
            }
        }
    }

    /// All ops across all outcomes
    pub fn all_ops(&self) -> Vec<&Op> {
        match self {
            ActionOutcomes::Deterministic(outcome) => outcome.ops.iter().collect(),
            ActionOutcomes::Weighted(list) | ActionOutcomes::Corrupting(list) => {
                list.iter().flat_map(|w| w.outcome.ops.iter()).collect()
            }
        }
    }
}

/// A quantity of one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub currency: String,
    pub amount: f64,
}

/// How much one use of an action costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CostDescriptor {
    Currency(Vec<CurrencyAmount>),
    /// Priced directly by the oracle under this key
    MarketKey(String),
}

impl CostDescriptor {
    pub fn single(currency: &str, amount: f64) -> Self {
        CostDescriptor::Currency(vec![CurrencyAmount {
            currency: currency.to_string(),
            amount,
        }])
    }

    /// (price key, quantity) pairs
    pub fn materials(&self) -> Vec<(&str, f64)> {
        match self {
            CostDescriptor::Currency(amounts) => amounts
                .iter()
                .map(|a| (a.currency.as_str(), a.amount))
                .collect(),
            CostDescriptor::MarketKey(key) => vec![(key.as_str(), 1.0)],
        }
    }
}

/// A currency known to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    pub name: String,
    /// Conservative value in reference units, used when no price is available
    pub reference_value: f64,
}

/// A catalog crafting action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftingAction {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tier: CurrencyTier,
    #[serde(default)]
    pub requirement: Requirement,
    pub outcomes: ActionOutcomes,
    pub cost: CostDescriptor,
    /// Modifier tags this action favours, used for relevance ordering
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CraftingAction {
    pub fn category(&self) -> ActionCategory {
        self.outcomes.category()
    }

    pub fn is_deterministic(&self) -> bool {
        self.category() == ActionCategory::Deterministic
    }

    /// Restricted to high-tier pools or guaranteed modifiers
    pub fn is_premium(&self) -> bool {
        let ops = self.outcomes.all_ops();
        let random: Vec<&&Op> = ops.iter().filter(|op| op.is_random_addition()).collect();
        if random.is_empty() {
            return ops.iter().any(|op| matches!(op, Op::AddSpecific(_)));
        }
        random
            .iter()
            .all(|op| matches!(op, Op::AddRandom { max_tier: Some(_), .. }))
    }
}
