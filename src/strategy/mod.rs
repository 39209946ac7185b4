//! Targets and crafting strategies

pub mod step;
pub mod target;

pub use step::{CraftingStep, Strategy, MAX_ATTEMPTS_PER_STEP};
pub use target::{DesiredItem, RequiredModifier, ValueBounds, DEFAULT_ITEM_LEVEL};
