//! Item definitions
//!
//! Core item state, rarities and rolled modifiers. An `ItemState` is the
//! subject of every crafting trial: it is created fresh, transformed by
//! crafting actions, and thrown away when the trial ends.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{AffixSlot, Modifier};
use crate::strategy::RequiredModifier;

/// Hard cap on prefixes or suffixes, regardless of rarity
pub const MAX_AFFIXES_PER_SIDE: usize = 3;

/// Highest quality a crafted item can reach
pub const MAX_QUALITY: u8 = 20;

/// Item rarity tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Normal, // White - no affixes
    Magic,  // Blue - one prefix, one suffix
    Rare,   // Yellow - up to three of each
}

impl Rarity {
    /// Get rarity name
    pub fn name(&self) -> &'static str {
        match self {
            Rarity::Normal => "Normal",
            Rarity::Magic => "Magic",
            Rarity::Rare => "Rare",
        }
    }

    /// Get number of affix slots per side for this rarity
    pub fn affix_slots(&self) -> usize {
        match self {
            Rarity::Normal => 0,
            Rarity::Magic => 1,
            Rarity::Rare => MAX_AFFIXES_PER_SIDE,
        }
    }
}

/// A modifier with concrete rolled values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolledModifier {
    pub modifier: Arc<Modifier>,
    pub values: Vec<i32>,
}

impl RolledModifier {
    pub fn new(modifier: Arc<Modifier>, values: Vec<i32>) -> Self {
        Self { modifier, values }
    }

    /// Display text with values filled in
    pub fn text(&self) -> String {
        self.modifier.render(&self.values)
    }

    pub fn group(&self) -> &str {
        &self.modifier.group
    }

    pub fn tier(&self) -> u8 {
        self.modifier.tier
    }

    pub fn slot(&self) -> AffixSlot {
        self.modifier.slot
    }

    /// Whether this rolled modifier fulfils a required modifier
    pub fn matches(&self, required: &RequiredModifier) -> bool {
        required.matches_text(&self.modifier) && required.accepts_values(&self.values)
    }
}

/// Mutable item state for one crafting trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    /// Item base id
    pub base: String,
    pub item_level: u32,
    pub rarity: Rarity,
    pub prefixes: Vec<RolledModifier>,
    pub suffixes: Vec<RolledModifier>,
    pub implicit: Option<RolledModifier>,
    pub corrupted: bool,
    pub quality: u8,
}

impl ItemState {
    /// Create a fresh Normal item of the given base
    pub fn new(base: impl Into<String>, item_level: u32) -> Self {
        Self {
            base: base.into(),
            item_level,
            rarity: Rarity::Normal,
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            implicit: None,
            corrupted: false,
            quality: 0,
        }
    }

    /// Affixes on one side (implicit slot returns the implicit, if any)
    pub fn side(&self, slot: AffixSlot) -> &[RolledModifier] {
        match slot {
            AffixSlot::Prefix => &self.prefixes,
            AffixSlot::Suffix => &self.suffixes,
            AffixSlot::Implicit => self.implicit.as_slice(),
        }
    }

    /// Slots per side allowed by the current rarity
    pub fn side_cap(&self) -> usize {
        self.rarity.affix_slots().min(MAX_AFFIXES_PER_SIDE)
    }

    /// Number of free slots on a side
    pub fn open_slots(&self, slot: AffixSlot) -> usize {
        match slot {
            AffixSlot::Implicit => usize::from(self.implicit.is_none()),
            _ => self.side_cap().saturating_sub(self.side(slot).len()),
        }
    }

    pub fn has_open_slot(&self, slot: AffixSlot) -> bool {
        self.open_slots(slot) > 0
    }

    /// Total prefixes and suffixes
    pub fn affix_count(&self) -> usize {
        self.prefixes.len() + self.suffixes.len()
    }

    /// Prefixes followed by suffixes
    pub fn affixes(&self) -> impl Iterator<Item = &RolledModifier> {
        self.prefixes.iter().chain(self.suffixes.iter())
    }

    /// Every modifier on the item, including the implicit
    pub fn all_modifiers(&self) -> impl Iterator<Item = &RolledModifier> {
        self.implicit.iter().chain(self.affixes())
    }

    /// Check if a modifier of this affix group is already present
    pub fn has_group(&self, group: &str) -> bool {
        self.all_modifiers().any(|m| m.group() == group)
    }

    /// Add an affix, enforcing group exclusivity and slot caps.
    /// Returns false (leaving the item untouched) if the affix does not fit.
    pub fn add_affix(&mut self, rolled: RolledModifier) -> bool {
        if self.has_group(rolled.group()) {
            return false;
        }
        match rolled.slot() {
            AffixSlot::Implicit => {
                self.implicit = Some(rolled);
                true
            }
            slot => {
                if !self.has_open_slot(slot) {
                    return false;
                }
                match slot {
                    AffixSlot::Prefix => self.prefixes.push(rolled),
                    _ => self.suffixes.push(rolled),
                }
                true
            }
        }
    }

    /// Remove the affix at `index` in `affixes()` order
    pub fn remove_affix(&mut self, index: usize) -> Option<RolledModifier> {
        if index < self.prefixes.len() {
            Some(self.prefixes.remove(index))
        } else if index < self.affix_count() {
            Some(self.suffixes.remove(index - self.prefixes.len()))
        } else {
            None
        }
    }

    /// Remove all prefixes and suffixes (the implicit stays)
    pub fn clear_affixes(&mut self) {
        self.prefixes.clear();
        self.suffixes.clear();
    }

    /// Drop affixes beyond the current rarity's cap (used after a rarity downgrade)
    pub fn truncate_to_cap(&mut self) {
        let cap = self.side_cap();
        self.prefixes.truncate(cap);
        self.suffixes.truncate(cap);
    }

    /// Whether some modifier on the item fulfils the requirement
    pub fn has_match(&self, required: &RequiredModifier) -> bool {
        self.all_modifiers().any(|m| m.matches(required))
    }

    /// Whether every required modifier is present
    pub fn satisfies(&self, required: &[RequiredModifier]) -> bool {
        required.iter().all(|r| self.has_match(r))
    }

    /// Requirements not yet fulfilled
    pub fn unmet<'a>(&self, required: &'a [RequiredModifier]) -> Vec<&'a RequiredModifier> {
        required.iter().filter(|r| !self.has_match(r)).collect()
    }

    /// Structural invariants every crafted item must hold
    pub fn check_invariants(&self) -> bool {
        if self.prefixes.len() > MAX_AFFIXES_PER_SIDE || self.suffixes.len() > MAX_AFFIXES_PER_SIDE {
            return false;
        }
        if self.prefixes.iter().any(|m| m.slot() != AffixSlot::Prefix)
            || self.suffixes.iter().any(|m| m.slot() != AffixSlot::Suffix)
        {
            return false;
        }
        let mut groups: Vec<&str> = self.all_modifiers().map(|m| m.group()).collect();
        let total = groups.len();
        groups.sort_unstable();
        groups.dedup();
        groups.len() == total
    }

    /// Short one-line summary for logs and reports
    pub fn summary(&self) -> String {
        let mods: Vec<String> = self.affixes().map(|m| m.text()).collect();
        format!(
            "{} {} (ilvl {}{}) [{}]",
            self.rarity.name(),
            self.base,
            self.item_level,
            if self.corrupted { ", corrupted" } else { "" },
            mods.join("; ")
        )
    }
}
