//! Aggregate statistics over many trials.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::trial::{TrialOutcome, TrialRecord};

/// Number of equal-width buckets in the cost histogram
pub const COST_HISTOGRAM_BINS: usize = 20;

/// Cost percentiles over all trials
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// One cost histogram bucket, `[lower, upper)` (last bucket inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Aggregated results of a simulation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trials: usize,
    pub successes: usize,
    pub failures: usize,
    pub success_probability: f64,
    pub mean_cost: f64,
    pub cost_std_dev: f64,
    pub mean_attempts: f64,
    pub percentile_costs: Percentiles,
    pub cost_histogram: Vec<HistogramBin>,
    /// Attempts per trial -> number of trials
    pub attempt_histogram: BTreeMap<u32, usize>,
    /// Failure kind -> number of trials
    pub failure_breakdown: BTreeMap<String, usize>,
    /// Run stopped early; counts cover only the trials that finished
    pub cancelled: bool,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    if max <= min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: sorted.len(),
        }];
    }
    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for &cost in sorted {
        let index = (((cost - min) / width) as usize).min(bins - 1);
        out[index].count += 1;
    }
    out
}

impl SimulationResult {
    /// Aggregate finished trials
    pub fn from_trials(records: &[TrialRecord], cancelled: bool) -> Self {
        let trials = records.len();
        if trials == 0 {
            return Self {
                cancelled,
                ..Default::default()
            };
        }

        let successes = records.iter().filter(|r| r.outcome.is_success()).count();
        let failures = trials - successes;
        let n = trials as f64;

        let mean_cost = records.iter().map(|r| r.cost).sum::<f64>() / n;
        let variance = records
            .iter()
            .map(|r| (r.cost - mean_cost).powi(2))
            .sum::<f64>()
            / n;
        let mean_attempts = records.iter().map(|r| r.attempts as f64).sum::<f64>() / n;

        let mut costs: Vec<f64> = records.iter().map(|r| r.cost).collect();
        costs.sort_by(f64::total_cmp);

        let percentile_costs = Percentiles {
            p10: percentile(&costs, 10.0),
            p25: percentile(&costs, 25.0),
            p50: percentile(&costs, 50.0),
            p75: percentile(&costs, 75.0),
            p90: percentile(&costs, 90.0),
        };

        let mut attempt_histogram = BTreeMap::new();
        let mut failure_breakdown = BTreeMap::new();
        for record in records {
            *attempt_histogram.entry(record.attempts).or_insert(0) += 1;
            if let TrialOutcome::Failed(reason) = record.outcome {
                *failure_breakdown.entry(reason.key().to_string()).or_insert(0) += 1;
            }
        }

        Self {
            trials,
            successes,
            failures,
            success_probability: successes as f64 / n,
            mean_cost,
            cost_std_dev: variance.sqrt(),
            mean_attempts,
            percentile_costs,
            cost_histogram: histogram(&costs, COST_HISTOGRAM_BINS),
            attempt_histogram,
            failure_breakdown,
            cancelled,
        }
    }

    /// Mean cost divided by the chance of success
    pub fn cost_per_success(&self) -> f64 {
        self.mean_cost / self.success_probability.max(0.01)
    }

    /// Generate a text report.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Trials: {}{}\n",
            self.trials,
            if self.cancelled { " (cancelled)" } else { "" }
        ));
        out.push_str(&format!(
            "Success: {} / {} ({:.1}%)\n",
            self.successes,
            self.trials,
            self.success_probability * 100.0
        ));
        out.push_str(&format!(
            "Cost: mean {:.2}, std dev {:.2}, attempts {:.1}\n",
            self.mean_cost, self.cost_std_dev, self.mean_attempts
        ));
        let p = &self.percentile_costs;
        out.push_str(&format!(
            "Percentiles: p10 {:.2} | p25 {:.2} | p50 {:.2} | p75 {:.2} | p90 {:.2}\n",
            p.p10, p.p25, p.p50, p.p75, p.p90
        ));
        for (reason, count) in &self.failure_breakdown {
            out.push_str(&format!("  failed ({}): {}\n", reason, count));
        }
        out
    }
}
