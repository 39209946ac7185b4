//! Modifier definitions and weighted modifier pools

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where a modifier sits on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AffixSlot {
    Prefix,
    Suffix,
    Implicit,
}

impl AffixSlot {
    pub fn name(&self) -> &'static str {
        match self {
            AffixSlot::Prefix => "prefix",
            AffixSlot::Suffix => "suffix",
            AffixSlot::Implicit => "implicit",
        }
    }
}

/// Inclusive integer range a modifier value is rolled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: i32,
    pub max: i32,
}

impl ValueRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Number of distinct integer values in the range
    pub fn span(&self) -> i64 {
        (self.max as i64 - self.min as i64 + 1).max(0)
    }

    /// Intersection with optional bounds, or None if they do not overlap
    pub fn clamp_to(&self, lower: Option<i32>, upper: Option<i32>) -> Option<ValueRange> {
        let min = lower.map_or(self.min, |l| l.max(self.min));
        let max = upper.map_or(self.max, |u| u.min(self.max));
        (min <= max).then_some(ValueRange { min, max })
    }

    /// Fraction of uniformly rolled values that land inside the bounds
    pub fn fraction_within(&self, lower: Option<i32>, upper: Option<i32>) -> f64 {
        match self.clamp_to(lower, upper) {
            Some(clamped) if self.span() > 0 => clamped.span() as f64 / self.span() as f64,
            _ => 0.0,
        }
    }
}

/// Base spawn weight for items carrying a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnWeight {
    pub tag: String,
    pub weight: u32,
}

/// Weight multiplier applied when an item base carries a tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAffinity {
    pub tag: String,
    pub multiplier: f64,
}

/// A catalog modifier (one tier of one affix family)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: String,
    /// Text template, `{}` marks each value
    pub text: String,
    pub slot: AffixSlot,
    /// 1 = best
    pub tier: u8,
    pub required_level: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub values: Vec<ValueRange>,
    /// Mutually exclusive family
    pub group: String,
    /// First entry whose tag the base carries decides the weight
    #[serde(default)]
    pub spawn_weights: Vec<SpawnWeight>,
    #[serde(default)]
    pub affinities: Vec<TagAffinity>,
}

impl Modifier {
    /// Spawn weight on a base with the given tags (0 = cannot spawn)
    pub fn spawn_weight_for(&self, base_tags: &[String]) -> u32 {
        self.spawn_weights
            .iter()
            .find(|sw| base_tags.iter().any(|t| *t == sw.tag))
            .map_or(0, |sw| sw.weight)
    }

    /// Product of affinity multipliers matching the base tags
    pub fn affinity_for(&self, base_tags: &[String]) -> f64 {
        self.affinities
            .iter()
            .filter(|a| base_tags.iter().any(|t| *t == a.tag))
            .map(|a| a.multiplier)
            .product()
    }

    /// Fill the text template with values
    pub fn render(&self, values: &[i32]) -> String {
        let mut out = String::with_capacity(self.text.len() + 8);
        let mut parts = self.text.split("{}");
        if let Some(first) = parts.next() {
            out.push_str(first);
        }
        for (i, part) in parts.enumerate() {
            match values.get(i) {
                Some(v) => out.push_str(&v.to_string()),
                None => out.push('#'),
            }
            out.push_str(part);
        }
        out
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A modifier with its sampling weight inside a pool
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierWeight {
    pub modifier: Arc<Modifier>,
    pub weight: f64,
    /// Affinity multiplier already folded into `weight`
    pub affinity: f64,
}

/// One side (prefix or suffix) of a pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSide {
    pub entries: Vec<ModifierWeight>,
    pub total_weight: f64,
}

impl PoolSide {
    pub fn new(entries: Vec<ModifierWeight>) -> Self {
        let total_weight = entries.iter().map(|e| e.weight).sum();
        Self { entries, total_weight }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() || self.total_weight <= 0.0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sub-pool of entries passing the predicate
    pub fn filtered(&self, keep: impl Fn(&ModifierWeight) -> bool) -> PoolSide {
        PoolSide::new(self.entries.iter().filter(|e| keep(e)).cloned().collect())
    }

    /// Concatenate two sides into one combined pool
    pub fn merged(&self, other: &PoolSide) -> PoolSide {
        let mut entries = self.entries.clone();
        entries.extend(other.entries.iter().cloned());
        PoolSide::new(entries)
    }
}

/// An item base the catalog knows how to craft on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemBase {
    pub id: String,
    pub item_class: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub implicit: Option<String>,
    #[serde(default)]
    pub drop_level: u32,
}

impl ItemBase {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Weighted prefix and suffix lists for one (base, item level) pair
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierPool {
    pub base: String,
    pub level: u32,
    pub prefixes: PoolSide,
    pub suffixes: PoolSide,
}

impl ModifierPool {
    /// Build the pool of every modifier that can spawn on `base` at `level`
    pub fn build(base: &ItemBase, level: u32, modifiers: &[Arc<Modifier>]) -> Self {
        let mut prefixes = Vec::new();
        let mut suffixes = Vec::new();

        for modifier in modifiers {
            if modifier.required_level > level {
                continue;
            }
            let spawn = modifier.spawn_weight_for(&base.tags);
            if spawn == 0 {
                continue;
            }
            let affinity = modifier.affinity_for(&base.tags);
            let entry = ModifierWeight {
                modifier: Arc::clone(modifier),
                weight: spawn as f64 * affinity,
                affinity,
            };
            match modifier.slot {
                AffixSlot::Prefix => prefixes.push(entry),
                AffixSlot::Suffix => suffixes.push(entry),
                AffixSlot::Implicit => {}
            }
        }

        Self {
            base: base.id.clone(),
            level,
            prefixes: PoolSide::new(prefixes),
            suffixes: PoolSide::new(suffixes),
        }
    }

    pub fn side(&self, slot: AffixSlot) -> Option<&PoolSide> {
        match slot {
            AffixSlot::Prefix => Some(&self.prefixes),
            AffixSlot::Suffix => Some(&self.suffixes),
            AffixSlot::Implicit => None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ModifierWeight> {
        self.prefixes.entries.iter().chain(self.suffixes.entries.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modifier(id: &str, slot: AffixSlot, level: u32, tag: &str, weight: u32) -> Arc<Modifier> {
        Arc::new(Modifier {
            id: id.to_string(),
            text: "+{} to Test".to_string(),
            slot,
            tier: 1,
            required_level: level,
            tags: Vec::new(),
            values: vec![ValueRange::new(10, 19)],
            group: id.to_string(),
            spawn_weights: vec![SpawnWeight { tag: tag.to_string(), weight }],
            affinities: vec![TagAffinity { tag: "boosted".to_string(), multiplier: 2.0 }],
        })
    }

    #[test]
    fn test_fraction_within() {
        let range = ValueRange::new(10, 19);
        assert_eq!(range.span(), 10);
        assert!((range.fraction_within(Some(15), None) - 0.5).abs() < 1e-9);
        assert_eq!(range.fraction_within(None, None), 1.0);
        assert_eq!(range.fraction_within(Some(30), None), 0.0);
    }

    #[test]
    fn test_render_template() {
        let m = Modifier {
            id: "added_phys".to_string(),
            text: "Adds {} to {} Physical Damage".to_string(),
            slot: AffixSlot::Prefix,
            tier: 1,
            required_level: 1,
            tags: Vec::new(),
            values: vec![ValueRange::new(1, 2), ValueRange::new(3, 4)],
            group: "AddedPhys".to_string(),
            spawn_weights: Vec::new(),
            affinities: Vec::new(),
        };
        assert_eq!(m.render(&[2, 4]), "Adds 2 to 4 Physical Damage");
        assert_eq!(m.render(&[2]), "Adds 2 to # Physical Damage");
    }

    #[test]
    fn test_pool_build_filters_level_and_tags() {
        let base = ItemBase {
            id: "Test Ring".to_string(),
            item_class: "Ring".to_string(),
            tags: vec!["ring".to_string(), "boosted".to_string()],
            implicit: None,
            drop_level: 1,
        };
        let mods = vec![
            modifier("low", AffixSlot::Prefix, 1, "ring", 100),
            modifier("high", AffixSlot::Prefix, 80, "ring", 100),
            modifier("wrong_tag", AffixSlot::Suffix, 1, "bow", 100),
            modifier("suffix", AffixSlot::Suffix, 1, "default", 50),
        ];

        let pool = ModifierPool::build(&base, 45, &mods);
        assert_eq!(pool.prefixes.len(), 1);
        assert!(pool.suffixes.is_empty());
        // affinity doubles the spawn weight
        assert_eq!(pool.prefixes.total_weight, 200.0);
    }
}
