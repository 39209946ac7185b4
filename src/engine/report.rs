//! Exported strategy reports

use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::pricing::{CostBreakdown, Recommendation};
use crate::sim::Percentiles;
use crate::strategy::{DesiredItem, Strategy};

/// One step as it appears in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStep {
    pub action_id: String,
    pub description: String,
    pub probability: f64,
    pub expected_attempts: f64,
    pub expected_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_action: Option<String>,
}

/// Serializable summary of one evaluated strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub target: DesiredItem,
    pub strategy: String,
    pub steps: Vec<ReportStep>,
    pub expected_cost: f64,
    pub success_probability: Option<f64>,
    pub cost_percentiles: Option<Percentiles>,
    pub cost: Option<CostBreakdown>,
    pub recommendation: Option<Recommendation>,
    pub engine_version: String,
}

impl StrategyReport {
    pub fn from_strategy(strategy: &Strategy) -> Self {
        let steps = strategy
            .steps
            .iter()
            .map(|step| ReportStep {
                action_id: step.action_id.clone(),
                description: step.description.clone(),
                probability: step.probability,
                expected_attempts: step.expected_attempts,
                expected_cost: step.expected_cost,
                fallback_action: step.fallback.as_ref().map(|f| f.action_id.clone()),
            })
            .collect();

        Self {
            target: strategy.target.clone(),
            strategy: strategy.name.clone(),
            steps,
            expected_cost: strategy.expected_cost(),
            success_probability: strategy.simulation.as_ref().map(|s| s.success_probability),
            cost_percentiles: strategy.simulation.as_ref().map(|s| s.percentile_costs),
            cost: strategy.total_cost.clone(),
            recommendation: strategy.recommendation.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        serde_json::to_string_pretty(self).map_err(|e| DataError::Serialize {
            what: format!("report for {}", self.strategy),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{CraftingStep, RequiredModifier};

    #[test]
    fn test_report_json_shape() {
        let life = RequiredModifier::new("maximum Life");
        let target = DesiredItem::new("Sapphire Ring").with_modifier(life.clone());
        let step = CraftingStep::new("transmutation", "Transmute for life", Some(life.clone()), 0.25, 0.01)
            .with_fallback(CraftingStep::new("essence_body", "Essence", Some(life), 1.0, 0.4));
        let strategy = Strategy::new("budget", target, vec![step]);

        let report = StrategyReport::from_strategy(&strategy);
        assert_eq!(report.steps[0].fallback_action.as_deref(), Some("essence_body"));
        assert!((report.expected_cost - 0.04).abs() < 1e-9);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["strategy"], "budget");
        assert_eq!(json["steps"][0]["action_id"], "transmutation");
        assert!(json["success_probability"].is_null());
    }
}
