//! Item system

pub mod applier;
pub mod item;

pub use applier::{roll_modifier, roll_values, ActionApplier};
pub use item::{ItemState, Rarity, RolledModifier, MAX_AFFIXES_PER_SIDE, MAX_QUALITY};
