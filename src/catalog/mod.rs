//! Crafting catalog
//!
//! Static registry of item bases, modifiers, currencies and crafting
//! actions, validated into a `KnowledgeBase`.

pub mod action;
pub mod knowledge;
pub mod modifier;

pub use action::{
    ActionCategory, ActionOutcomes, CostDescriptor, CraftingAction, Currency, CurrencyAmount,
    CurrencyTier, Op, Outcome, Requirement, SideFilter, SlotRequirement, WeightedOutcome,
};
pub use knowledge::{Catalog, KnowledgeBase, UNKNOWN_CURRENCY_VALUE};
pub use modifier::{
    AffixSlot, ItemBase, Modifier, ModifierPool, ModifierWeight, PoolSide, SpawnWeight,
    TagAffinity, ValueRange,
};
