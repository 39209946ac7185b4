//! Target item specification

use serde::{Deserialize, Serialize};

use crate::catalog::Modifier;
use crate::error::{CraftError, CraftResult};

/// Item level assumed when a target does not name one
pub const DEFAULT_ITEM_LEVEL: u32 = 82;

fn default_item_level() -> u32 {
    DEFAULT_ITEM_LEVEL
}

fn default_importance() -> f64 {
    1.0
}

/// Optional inclusive bounds on a modifier's first value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValueBounds {
    #[serde(default)]
    pub min: Option<i32>,
    #[serde(default)]
    pub max: Option<i32>,
}

impl ValueBounds {
    pub fn at_least(min: i32) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn contains(&self, value: i32) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// One modifier the finished item must carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredModifier {
    /// Case-insensitive substring of the modifier text, or a modifier id
    pub pattern: String,
    #[serde(default)]
    pub value_range: Option<ValueBounds>,
    #[serde(default = "default_importance")]
    pub importance: f64,
}

impl RequiredModifier {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            value_range: None,
            importance: default_importance(),
        }
    }

    pub fn with_min(mut self, min: i32) -> Self {
        self.value_range = Some(ValueBounds::at_least(min));
        self
    }

    /// Whether the modifier's id or text matches the pattern
    pub fn matches_text(&self, modifier: &Modifier) -> bool {
        let pattern = self.pattern.trim();
        if modifier.id.eq_ignore_ascii_case(pattern) {
            return true;
        }
        let text = modifier.text.replace("{}", "#").to_lowercase();
        text.contains(&pattern.to_lowercase())
    }

    pub fn bounds(&self) -> (Option<i32>, Option<i32>) {
        self.value_range.map_or((None, None), |b| (b.min, b.max))
    }

    /// Whether rolled values satisfy the value range (first value only)
    pub fn accepts_values(&self, values: &[i32]) -> bool {
        match self.value_range {
            None => true,
            Some(bounds) if bounds.is_unbounded() => true,
            Some(bounds) => values.first().is_some_and(|v| bounds.contains(*v)),
        }
    }

    /// Share of uniform rolls of `modifier` that satisfy the value range
    pub fn value_fraction(&self, modifier: &Modifier) -> f64 {
        match self.value_range {
            None => 1.0,
            Some(bounds) if bounds.is_unbounded() => 1.0,
            Some(bounds) => modifier
                .values
                .first()
                .map_or(0.0, |r| r.fraction_within(bounds.min, bounds.max)),
        }
    }

    pub fn label(&self) -> String {
        match self.bounds() {
            (Some(min), Some(max)) => format!("{} ({}-{})", self.pattern, min, max),
            (Some(min), None) => format!("{} (>= {})", self.pattern, min),
            (None, Some(max)) => format!("{} (<= {})", self.pattern, max),
            (None, None) => self.pattern.clone(),
        }
    }
}

/// The item a player wants crafted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredItem {
    pub base_type: String,
    #[serde(default)]
    pub item_class: String,
    #[serde(default = "default_item_level")]
    pub item_level: u32,
    #[serde(default)]
    pub required: Vec<RequiredModifier>,
    /// Strategies expected to cost more than this are dropped
    #[serde(default)]
    pub budget: Option<f64>,
}

impl DesiredItem {
    pub fn new(base_type: impl Into<String>) -> Self {
        Self {
            base_type: base_type.into(),
            item_class: String::new(),
            item_level: DEFAULT_ITEM_LEVEL,
            required: Vec::new(),
            budget: None,
        }
    }

    pub fn with_modifier(mut self, required: RequiredModifier) -> Self {
        self.required.push(required);
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Parse a target from JSON (leading `{`) or RON
    pub fn parse(text: &str) -> CraftResult<Self> {
        let trimmed = text.trim();
        let parsed: Self = if trimmed.starts_with('{') {
            serde_json::from_str(trimmed)
                .map_err(|e| CraftError::Configuration(format!("invalid JSON target: {}", e)))?
        } else {
            ron::from_str(trimmed)
                .map_err(|e| CraftError::Configuration(format!("invalid RON target: {}", e)))?
        };
        parsed.validate()?;
        Ok(parsed)
    }

    /// Shape checks that do not need a catalog
    pub fn validate(&self) -> CraftResult<()> {
        let invalid = |msg: &str| Err(CraftError::Configuration(msg.to_string()));

        if self.base_type.trim().is_empty() {
            return invalid("base type is empty");
        }
        if self.item_level == 0 || self.item_level > 100 {
            return invalid("item level must be between 1 and 100");
        }
        if self.required.is_empty() {
            return invalid("no required modifiers");
        }
        for required in &self.required {
            if required.pattern.trim().is_empty() {
                return invalid("required modifier with an empty pattern");
            }
            if !required.importance.is_finite() || required.importance <= 0.0 {
                return invalid("importance must be a positive number");
            }
            if let (Some(min), Some(max)) = required.bounds() {
                if min > max {
                    return Err(CraftError::Configuration(format!(
                        "value range of {} is empty",
                        required.pattern
                    )));
                }
            }
        }
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget <= 0.0 {
                return invalid("budget must be a positive number");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AffixSlot, ValueRange};

    fn life() -> Modifier {
        Modifier {
            id: "life_t3".to_string(),
            text: "+{} to maximum Life".to_string(),
            slot: AffixSlot::Prefix,
            tier: 3,
            required_level: 44,
            tags: vec!["life".to_string()],
            values: vec![ValueRange::new(50, 59)],
            group: "IncreasedLife".to_string(),
            spawn_weights: Vec::new(),
            affinities: Vec::new(),
        }
    }

    #[test]
    fn test_pattern_matching() {
        let m = life();
        assert!(RequiredModifier::new("maximum life").matches_text(&m));
        assert!(RequiredModifier::new("+# to Maximum Life").matches_text(&m));
        assert!(RequiredModifier::new("LIFE_T3").matches_text(&m));
        assert!(!RequiredModifier::new("maximum Mana").matches_text(&m));
    }

    #[test]
    fn test_value_fraction() {
        let m = life();
        assert_eq!(RequiredModifier::new("life").value_fraction(&m), 1.0);
        assert!((RequiredModifier::new("life").with_min(55).value_fraction(&m) - 0.5).abs() < 1e-9);
        assert_eq!(RequiredModifier::new("life").with_min(70).value_fraction(&m), 0.0);
    }

    #[test]
    fn test_accepts_values() {
        let req = RequiredModifier::new("life").with_min(55);
        assert!(req.accepts_values(&[55]));
        assert!(!req.accepts_values(&[54]));
        assert!(!req.accepts_values(&[]));
        assert!(RequiredModifier::new("life").accepts_values(&[]));
    }

    #[test]
    fn test_parse_json_defaults_item_level() {
        let target = DesiredItem::parse(
            r#"{"base_type": "Sapphire Ring", "required": [{"pattern": "maximum Life"}]}"#,
        )
        .unwrap();
        assert_eq!(target.item_level, DEFAULT_ITEM_LEVEL);
        assert_eq!(target.required[0].importance, 1.0);
    }

    #[test]
    fn test_parse_ron() {
        let target = DesiredItem::parse(
            r#"(base_type: "Sapphire Ring", item_level: 75, required: [(pattern: "Cold Resistance", value_range: Some((min: Some(30))))], budget: Some(50.0))"#,
        )
        .unwrap();
        assert_eq!(target.item_level, 75);
        assert_eq!(target.required[0].bounds(), (Some(30), None));
        assert_eq!(target.budget, Some(50.0));
    }

    #[test]
    fn test_validate_rejects_bad_targets() {
        assert!(DesiredItem::parse("not a target").is_err());
        assert!(DesiredItem::new("Sapphire Ring").validate().is_err());

        let mut target = DesiredItem::new("Sapphire Ring").with_modifier(RequiredModifier::new("life"));
        target.required[0].value_range = Some(ValueBounds {
            min: Some(10),
            max: Some(5),
        });
        assert!(matches!(target.validate(), Err(CraftError::Configuration(_))));
    }
}
