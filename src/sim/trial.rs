//! Single-trial state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a trial ended without the target item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// A step used all its attempts without hitting and had no fallback
    AttemptCapExhausted { step: usize },
    /// A step's action could not be applied and had no fallback
    RequirementUnmet { step: usize },
    /// Every step ran but the item still misses a requirement
    StepsExhausted,
}

impl FailureReason {
    /// Stable key for failure breakdowns
    pub fn key(&self) -> &'static str {
        match self {
            FailureReason::AttemptCapExhausted { .. } => "attempt_cap_exhausted",
            FailureReason::RequirementUnmet { .. } => "requirement_unmet",
            FailureReason::StepsExhausted => "steps_exhausted",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AttemptCapExhausted { step } => {
                write!(f, "step {} ran out of attempts", step + 1)
            }
            FailureReason::RequirementUnmet { step } => {
                write!(f, "step {} could not be applied", step + 1)
            }
            FailureReason::StepsExhausted => write!(f, "all steps used without reaching the target"),
        }
    }
}

/// Trial lifecycle: `Building` until one of the terminal states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Building,
    Success,
    Failed(FailureReason),
}

impl TrialState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrialState::Building)
    }
}

/// Terminal outcome of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialOutcome {
    Success,
    Failed(FailureReason),
}

impl TrialOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TrialOutcome::Success)
    }
}

/// Result of one simulated execution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub outcome: TrialOutcome,
    /// Reference-unit cost of every draw made
    pub cost: f64,
    pub attempts: u32,
}

/// Running totals for one trial
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tally {
    pub state: TrialState,
    pub cost: f64,
    pub attempts: u32,
}

impl Tally {
    pub fn new() -> Self {
        Self {
            state: TrialState::Building,
            cost: 0.0,
            attempts: 0,
        }
    }

    pub fn charge(&mut self, cost: f64) {
        self.cost += cost;
        self.attempts += 1;
    }

    pub fn finish(self) -> TrialRecord {
        let outcome = match self.state {
            TrialState::Success => TrialOutcome::Success,
            TrialState::Failed(reason) => TrialOutcome::Failed(reason),
            TrialState::Building => TrialOutcome::Failed(FailureReason::StepsExhausted),
        };
        TrialRecord {
            outcome,
            cost: self.cost,
            attempts: self.attempts,
        }
    }
}
