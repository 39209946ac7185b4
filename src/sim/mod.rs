//! Monte Carlo crafting simulator
//!
//! Runs a strategy many times from a fresh item and aggregates cost and
//! success statistics.

pub mod config;
pub mod report;
pub mod runner;
pub mod trial;

pub use config::SimConfig;
pub use report::{HistogramBin, Percentiles, SimulationResult, COST_HISTOGRAM_BINS};
pub use runner::{batch_seed, Simulator};
pub use trial::{FailureReason, TrialOutcome, TrialRecord, TrialState};
