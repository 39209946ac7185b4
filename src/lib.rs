//! Craftplan - crafting simulation and strategy optimization
//!
//! Models item crafting in an ARPG with random modifiers: a catalog of
//! bases, modifiers and currencies, a Monte Carlo simulator for action
//! sequences, and an optimizer that ranks strategies by cost, success rate,
//! time or profit.

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod items;
pub mod optimizer;
pub mod pricing;
pub mod sim;
pub mod strategy;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use catalog::{Catalog, KnowledgeBase};
pub use config::EngineConfig;
pub use engine::{CraftingEngine, StrategyReport};
pub use error::{CraftError, CraftResult, DataError};
pub use items::{ItemState, Rarity};
pub use optimizer::{Objective, OptimizerConfig, RiskTolerance, StrategySet};
pub use pricing::{CraftVerdict, MarketSource, PriceOracle, Recommendation};
pub use sim::{SimConfig, SimulationResult};
pub use strategy::{CraftingStep, DesiredItem, RequiredModifier, Strategy};
