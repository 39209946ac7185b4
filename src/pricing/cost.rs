//! Cost aggregation and craft-vs-buy comparison

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::cache::PriceCache;
use super::oracle::{MarketSource, PriceOracle};
use crate::catalog::{CraftingAction, KnowledgeBase, UNKNOWN_CURRENCY_VALUE};
use crate::strategy::{DesiredItem, Strategy};

/// Currency every cost is expressed in
pub const REFERENCE_CURRENCY: &str = "exalted";

/// Heuristic cost envelope used when no simulation is attached
const MIN_COST_FACTOR: f64 = 0.1;
const MAX_COST_FACTOR: f64 = 10.0;

/// Craft when it costs below this share of the market price, buy above the inverse
const CRAFT_THRESHOLD: f64 = 0.9;
const BUY_THRESHOLD: f64 = 1.1;

/// Cached unit prices with catalog fallbacks
pub struct PriceService {
    oracle: Arc<dyn PriceOracle>,
    cache: PriceCache,
    league: String,
    fallbacks: HashMap<String, f64>,
}

impl fmt::Debug for PriceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceService")
            .field("league", &self.league)
            .field("ttl", &self.cache.ttl())
            .field("fallbacks", &self.fallbacks.len())
            .finish()
    }
}

impl PriceService {
    pub fn new(oracle: Arc<dyn PriceOracle>, kb: &KnowledgeBase, league: impl Into<String>, ttl: Duration) -> Self {
        let fallbacks = kb
            .currencies()
            .map(|c| (c.id.clone(), c.reference_value))
            .collect();
        Self {
            oracle,
            cache: PriceCache::new(ttl),
            league: league.into(),
            fallbacks,
        }
    }

    pub fn league(&self) -> &str {
        &self.league
    }

    /// Conservative catalog value for a key
    pub fn fallback_price(&self, key: &str) -> f64 {
        self.fallbacks
            .get(key)
            .copied()
            .unwrap_or(UNKNOWN_CURRENCY_VALUE)
    }

    /// Unit price in reference units; never fails
    pub fn unit_price(&self, key: &str) -> f64 {
        if key == REFERENCE_CURRENCY {
            return 1.0;
        }
        let fetched = self
            .cache
            .get_or_fetch(key, || self.oracle.unit_price(key, &self.league));
        match fetched {
            Ok(price) if price.is_finite() && price >= 0.0 => price,
            Ok(price) => {
                log::warn!("Oracle returned invalid price {} for {}, using fallback", price, key);
                self.fallback_price(key)
            }
            Err(e) => {
                let fallback = self.fallback_price(key);
                log::warn!("{}; using fallback {:.3}", e, fallback);
                fallback
            }
        }
    }
}

/// One material line in a cost breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialCost {
    pub key: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
}

/// Cost of a strategy in reference units
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub expected: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub standard_deviation: f64,
    pub materials: Vec<MaterialCost>,
}

/// Craft-vs-buy verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CraftVerdict {
    Craft,
    Buy,
    Either,
}

impl CraftVerdict {
    pub fn name(&self) -> &'static str {
        match self {
            CraftVerdict::Craft => "craft",
            CraftVerdict::Buy => "buy",
            CraftVerdict::Either => "either",
        }
    }
}

/// Result of comparing a strategy's cost to the market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation: CraftVerdict,
    pub reasoning: String,
    /// Market price minus craft cost (negative when buying is cheaper)
    pub savings: Option<f64>,
    pub market_price: Option<f64>,
    pub craft_cost: f64,
}

/// Turns strategies into reference-unit costs
#[derive(Debug, Clone, Copy)]
pub struct CostCalculator<'a> {
    kb: &'a KnowledgeBase,
    prices: &'a PriceService,
}

impl<'a> CostCalculator<'a> {
    pub fn new(kb: &'a KnowledgeBase, prices: &'a PriceService) -> Self {
        Self { kb, prices }
    }

    /// Cost of one use of an action
    pub fn action_cost(&self, action: &CraftingAction) -> f64 {
        action
            .cost
            .materials()
            .into_iter()
            .map(|(key, qty)| self.prices.unit_price(key) * qty)
            .sum()
    }

    /// Materials times expected attempts, priced; the envelope and spread
    /// come from the attached simulation when there is one.
    pub fn calculate_strategy_cost(&self, strategy: &Strategy) -> CostBreakdown {
        let mut quantities: BTreeMap<String, f64> = BTreeMap::new();
        for step in &strategy.steps {
            let Some(action) = self.kb.action(&step.action_id) else {
                log::warn!("Strategy '{}' uses unknown action {}", strategy.name, step.action_id);
                continue;
            };
            for (key, qty) in action.cost.materials() {
                *quantities.entry(key.to_string()).or_insert(0.0) += qty * step.expected_attempts;
            }
        }

        let materials: Vec<MaterialCost> = quantities
            .into_iter()
            .map(|(key, quantity)| {
                let unit_price = self.prices.unit_price(&key);
                MaterialCost {
                    total: unit_price * quantity,
                    key,
                    quantity,
                    unit_price,
                }
            })
            .collect();
        let expected: f64 = materials.iter().map(|m| m.total).sum();

        let (minimum, maximum, standard_deviation) = match &strategy.simulation {
            Some(sim) if sim.trials > 0 => (
                sim.percentile_costs.p10,
                sim.percentile_costs.p90,
                sim.cost_std_dev,
            ),
            _ => (expected * MIN_COST_FACTOR, expected * MAX_COST_FACTOR, 0.0),
        };

        CostBreakdown {
            expected,
            minimum,
            maximum,
            standard_deviation,
            materials,
        }
    }

    /// Cheapest listing for the target, in reference units
    pub fn market_price(&self, target: &DesiredItem, market: &dyn MarketSource) -> Option<f64> {
        let listings = match market.find_listings(target) {
            Ok(listings) => listings,
            Err(e) => {
                log::warn!("{}; treating market as empty", e);
                return None;
            }
        };
        listings
            .iter()
            .map(|l| l.price * self.prices.unit_price(&l.currency))
            .filter(|p| p.is_finite() && *p > 0.0)
            .min_by(f64::total_cmp)
    }

    /// Whether crafting the target with `strategy` beats buying it
    pub fn compare_craft_vs_buy(
        &self,
        target: &DesiredItem,
        strategy: &Strategy,
        market: &dyn MarketSource,
    ) -> Recommendation {
        let craft_cost = match &strategy.total_cost {
            Some(cost) => cost.expected,
            None => self.calculate_strategy_cost(strategy).expected,
        };

        let Some(market_price) = self.market_price(target, market) else {
            return Recommendation {
                recommendation: CraftVerdict::Craft,
                reasoning: "No market data available for this item; crafting is the only priced option"
                    .to_string(),
                savings: None,
                market_price: None,
                craft_cost,
            };
        };

        let savings = market_price - craft_cost;
        let (recommendation, reasoning) = if craft_cost < market_price * CRAFT_THRESHOLD {
            (
                CraftVerdict::Craft,
                format!(
                    "Crafting costs {:.2} against a market price of {:.2}, saving {:.2}",
                    craft_cost, market_price, savings
                ),
            )
        } else if craft_cost > market_price * BUY_THRESHOLD {
            (
                CraftVerdict::Buy,
                format!(
                    "Buying at {:.2} is cheaper than crafting at {:.2}",
                    market_price, craft_cost
                ),
            )
        } else {
            (
                CraftVerdict::Either,
                format!(
                    "Crafting ({:.2}) and buying ({:.2}) cost about the same",
                    craft_cost, market_price
                ),
            )
        };

        Recommendation {
            recommendation,
            reasoning,
            savings: Some(savings),
            market_price: Some(market_price),
            craft_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_catalog;
    use crate::pricing::{DataUnavailable, Listing, NoMarket, StaticMarket, StaticPriceOracle};
    use crate::strategy::{CraftingStep, RequiredModifier};

    struct FailingOracle;

    impl PriceOracle for FailingOracle {
        fn unit_price(&self, key: &str, _league: &str) -> Result<f64, DataUnavailable> {
            Err(DataUnavailable::new(key, "offline"))
        }
    }

    #[derive(Default)]
    struct CountingOracle {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl PriceOracle for CountingOracle {
        fn unit_price(&self, key: &str, _league: &str) -> Result<f64, DataUnavailable> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(DataUnavailable::new(key, "offline"))
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(default_catalog()).unwrap()
    }

    fn strategy() -> Strategy {
        let target = DesiredItem::new("Sapphire Ring").with_modifier(RequiredModifier::new("Life"));
        let steps = vec![
            CraftingStep::new("transmutation", "t", None, 0.25, 0.0),
            CraftingStep::new("regal", "r", None, 1.0, 0.0),
        ];
        Strategy::new("s", target, steps)
    }

    #[test]
    fn test_failing_oracle_uses_catalog_constant() {
        let kb = kb();
        let prices = PriceService::new(Arc::new(FailingOracle), &kb, "Standard", Duration::from_secs(60));
        let chaos = kb.currency("chaos").unwrap().reference_value;
        assert_eq!(prices.unit_price("chaos"), chaos);
        assert_eq!(prices.unit_price("nonsense"), UNKNOWN_CURRENCY_VALUE);
        assert_eq!(prices.unit_price(REFERENCE_CURRENCY), 1.0);
    }

    #[test]
    fn test_unavailable_price_is_asked_once_per_window() {
        let kb = kb();
        let oracle = Arc::new(CountingOracle::default());
        let prices = PriceService::new(oracle.clone(), &kb, "Standard", Duration::from_secs(300));
        let chaos = kb.currency("chaos").unwrap().reference_value;

        for _ in 0..5 {
            assert_eq!(prices.unit_price("chaos"), chaos);
        }
        assert_eq!(oracle.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strategy_cost_sums_materials() {
        let kb = kb();
        let oracle = StaticPriceOracle::new()
            .with_price("transmutation", 0.01)
            .with_price("regal", 0.5);
        let prices = PriceService::new(Arc::new(oracle), &kb, "Standard", Duration::from_secs(60));
        let calc = CostCalculator::new(&kb, &prices);

        let cost = calc.calculate_strategy_cost(&strategy());
        // 4 transmutes expected, 1 regal
        assert!((cost.expected - (4.0 * 0.01 + 0.5)).abs() < 1e-9);
        assert!((cost.minimum - cost.expected * 0.1).abs() < 1e-9);
        assert!((cost.maximum - cost.expected * 10.0).abs() < 1e-9);
        assert_eq!(cost.materials.len(), 2);
    }

    #[test]
    fn test_no_market_data_recommends_craft() {
        let kb = kb();
        let prices = PriceService::new(Arc::new(StaticPriceOracle::new()), &kb, "Standard", Duration::from_secs(60));
        let calc = CostCalculator::new(&kb, &prices);
        let strategy = strategy();

        let rec = calc.compare_craft_vs_buy(&strategy.target, &strategy, &NoMarket);
        assert_eq!(rec.recommendation, CraftVerdict::Craft);
        assert!(rec.reasoning.contains("No market data"));
        assert!(rec.market_price.is_none());
    }

    #[test]
    fn test_verdict_thresholds() {
        let kb = kb();
        let prices = PriceService::new(Arc::new(StaticPriceOracle::new()), &kb, "Standard", Duration::from_secs(60));
        let calc = CostCalculator::new(&kb, &prices);
        let mut strategy = strategy();
        strategy.total_cost = Some(CostBreakdown {
            expected: 10.0,
            ..Default::default()
        });

        let cheap = StaticMarket::new(vec![Listing::new(5.0, REFERENCE_CURRENCY)]);
        let pricey = StaticMarket::new(vec![Listing::new(50.0, REFERENCE_CURRENCY)]);
        let close = StaticMarket::new(vec![Listing::new(10.5, REFERENCE_CURRENCY), Listing::new(99.0, REFERENCE_CURRENCY)]);

        assert_eq!(calc.compare_craft_vs_buy(&strategy.target, &strategy, &cheap).recommendation, CraftVerdict::Buy);
        let craft = calc.compare_craft_vs_buy(&strategy.target, &strategy, &pricey);
        assert_eq!(craft.recommendation, CraftVerdict::Craft);
        assert_eq!(craft.savings, Some(40.0));
        assert_eq!(calc.compare_craft_vs_buy(&strategy.target, &strategy, &close).recommendation, CraftVerdict::Either);
    }
}
