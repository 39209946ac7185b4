//! Crafting engine
//!
//! Thin coordination layer over the catalog, optimizer, simulator and
//! pricing. Owns the shared context objects and hands out borrowed views of
//! them for each request.

pub mod report;

use std::sync::Arc;

pub use report::{ReportStep, StrategyReport};

use crate::cancel::CancellationToken;
use crate::catalog::{Catalog, KnowledgeBase};
use crate::config::EngineConfig;
use crate::data::DataManager;
use crate::error::CraftResult;
use crate::optimizer::{OptimizerConfig, StrategyOptimizer, StrategySet};
use crate::pricing::{CostBreakdown, CostCalculator, MarketSource, PriceOracle, PriceService, Recommendation};
use crate::sim::{SimulationResult, Simulator};
use crate::strategy::{DesiredItem, Strategy};

/// Trials used to cost a strategy that arrives without a simulation
const COSTING_ITERATIONS: usize = 200;

/// Entry point for planning, simulating and pricing crafts
pub struct CraftingEngine {
    kb: Arc<KnowledgeBase>,
    prices: PriceService,
    market: Arc<dyn MarketSource>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl CraftingEngine {
    pub fn new(
        catalog: Catalog,
        oracle: Arc<dyn PriceOracle>,
        market: Arc<dyn MarketSource>,
        config: EngineConfig,
    ) -> CraftResult<Self> {
        config.validate()?;
        let kb = Arc::new(KnowledgeBase::new(catalog)?);
        let prices = PriceService::new(oracle, &kb, config.league.clone(), config.price_ttl());
        Ok(Self {
            kb,
            prices,
            market,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Build from loaded data files
    pub fn from_data(
        data: DataManager,
        oracle: Arc<dyn PriceOracle>,
        market: Arc<dyn MarketSource>,
    ) -> CraftResult<Self> {
        Self::new(data.catalog, oracle, market, data.engine)
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that stops running simulations and optimizations when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn simulator(&self) -> Simulator<'_> {
        Simulator::new(&self.kb, self.config.sim.clone()).with_cancellation(self.cancel.clone())
    }

    fn costs(&self) -> CostCalculator<'_> {
        CostCalculator::new(&self.kb, &self.prices)
    }

    /// Parse a JSON or RON target and check it against the catalog
    pub fn parse_target(&self, text: &str) -> CraftResult<DesiredItem> {
        let mut target = DesiredItem::parse(text)?;
        let base = self.kb.base(&target.base_type)?;
        target.base_type = base.id.clone();
        if target.item_class.is_empty() {
            target.item_class = base.item_class.clone();
        }
        Ok(target)
    }

    /// Ranked strategies for the target
    pub fn generate_strategies(&self, target: &DesiredItem, config: &OptimizerConfig) -> CraftResult<StrategySet> {
        log::info!(
            "Planning {} with {} required modifiers (objective: {})",
            target.base_type,
            target.required.len(),
            config.optimize_for
        );
        StrategyOptimizer::new(
            &self.kb,
            &self.prices,
            self.market.as_ref(),
            self.config.sim.clone(),
            self.config.tier_boost,
        )
        .with_cancellation(self.cancel.clone())
        .optimize(target, config)
    }

    /// Ranked strategies using the configured optimizer settings
    pub fn generate_default(&self, target: &DesiredItem) -> CraftResult<StrategySet> {
        self.generate_strategies(target, &self.config.optimizer)
    }

    pub fn simulate_strategy(&self, strategy: &Strategy, iterations: usize) -> CraftResult<SimulationResult> {
        self.simulator().simulate_strategy(strategy, iterations)
    }

    /// Cost breakdown; a strategy without a simulation gets a short one first
    pub fn calculate_strategy_cost(&self, strategy: &Strategy) -> CraftResult<CostBreakdown> {
        if strategy.simulation.is_some() {
            return Ok(self.costs().calculate_strategy_cost(strategy));
        }
        let mut simulated = strategy.clone();
        let iterations = self.config.sim.iterations.min(COSTING_ITERATIONS);
        simulated.simulation = Some(self.simulate_strategy(strategy, iterations)?);
        Ok(self.costs().calculate_strategy_cost(&simulated))
    }

    pub fn compare_craft_vs_buy(&self, target: &DesiredItem, strategy: &Strategy) -> Recommendation {
        self.costs().compare_craft_vs_buy(target, strategy, self.market.as_ref())
    }

    pub fn export_report(&self, strategy: &Strategy) -> StrategyReport {
        StrategyReport::from_strategy(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_catalog;
    use crate::error::CraftError;
    use crate::pricing::{Listing, NoMarket, StaticMarket, StaticPriceOracle};

    fn engine(market: Arc<dyn MarketSource>) -> CraftingEngine {
        CraftingEngine::new(
            default_catalog(),
            Arc::new(StaticPriceOracle::new()),
            market,
            EngineConfig::quick().with_seed(3),
        )
        .unwrap()
    }

    const TARGET: &str = r#"{
        "base_type": "sapphire ring",
        "required": [{ "pattern": "maximum Life" }]
    }"#;

    #[test]
    fn test_parse_target_normalises_base() {
        let engine = engine(Arc::new(NoMarket));
        let target = engine.parse_target(TARGET).unwrap();
        assert_eq!(target.base_type, "Sapphire Ring");
        assert_eq!(target.item_class, "Ring");
        assert_eq!(target.item_level, 82);
    }

    #[test]
    fn test_parse_target_rejects_unknown_base() {
        let engine = engine(Arc::new(NoMarket));
        let err = engine
            .parse_target(r#"(base_type: "Wooden Spoon", required: [(pattern: "Life")])"#)
            .unwrap_err();
        assert!(matches!(err, CraftError::UnknownBase(_)));
    }

    #[test]
    fn test_cost_without_simulation_runs_one() {
        let engine = engine(Arc::new(NoMarket));
        let target = engine.parse_target(TARGET).unwrap();
        let set = engine.generate_strategies(&target, &OptimizerConfig::heuristics_only()).unwrap();
        let mut strategy = set.best().unwrap().clone();
        strategy.reset_evaluation();

        let cost = engine.calculate_strategy_cost(&strategy).unwrap();
        assert!(cost.expected > 0.0);
        assert!(cost.minimum <= cost.maximum);
    }

    #[test]
    fn test_cheap_listing_means_buy() {
        let engine = engine(Arc::new(StaticMarket::new(vec![Listing::new(0.0001, "exalted")])));
        let target = engine.parse_target(TARGET).unwrap();
        let set = engine.generate_strategies(&target, &OptimizerConfig::heuristics_only()).unwrap();
        let best = set.best().unwrap();
        let rec = engine.compare_craft_vs_buy(&target, best);
        assert_eq!(rec.recommendation, crate::pricing::CraftVerdict::Buy);
    }
}
