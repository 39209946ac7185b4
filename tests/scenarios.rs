//! End-to-end planning scenarios against the built-in catalog

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use craftplan::catalog::KnowledgeBase;
use craftplan::data::default_catalog;
use craftplan::items::{ActionApplier, MAX_AFFIXES_PER_SIDE};
use craftplan::pricing::{NoMarket, StaticPriceOracle};
use craftplan::sim::{SimConfig, Simulator};
use craftplan::{
    CraftError, CraftVerdict, CraftingEngine, CraftingStep, DesiredItem, EngineConfig, Objective,
    OptimizerConfig, Rarity, RequiredModifier, RiskTolerance, Strategy,
};

fn kb() -> KnowledgeBase {
    KnowledgeBase::new(default_catalog()).unwrap()
}

fn engine() -> CraftingEngine {
    CraftingEngine::new(
        default_catalog(),
        Arc::new(StaticPriceOracle::new()),
        Arc::new(NoMarket),
        EngineConfig::quick().with_seed(1234),
    )
    .unwrap()
}

fn life_target() -> DesiredItem {
    DesiredItem::new("Sapphire Ring").with_modifier(RequiredModifier::new("maximum Life"))
}

#[test]
fn test_guaranteed_action_always_succeeds() {
    let kb = kb();
    let sim = Simulator::new(&kb, SimConfig::seeded(7));
    let life = RequiredModifier::new("maximum Life");
    let step = CraftingStep::new("essence_body", "Essence of the Body", Some(life), 1.0, 0.4);
    let strategy = Strategy::new("essence", life_target(), vec![step]);

    let result = sim.simulate_strategy(&strategy, 100).unwrap();
    assert_eq!(result.trials, 100);
    assert_eq!(result.successes, 100);
    assert_eq!(result.failures, 0);
    assert!((result.mean_cost - 0.4).abs() < 1e-9);
}

#[test]
fn test_capped_step_matches_geometric_odds() {
    let kb = kb();
    let sim = Simulator::new(&kb, SimConfig::default());
    let life = RequiredModifier::new("maximum Life");
    // p = 0.1 with a retry multiplier of 1 caps the step at 10 attempts
    let step = CraftingStep::new("transmutation", "transmute", Some(life), 0.1, 0.01);
    assert_eq!(step.attempt_cap(1.0), 10);
    let strategy = Strategy::new("transmute", life_target(), vec![step]);

    let result = sim.simulate_with(&strategy, 10_000, 1.0, Some(99)).unwrap();
    let expected = 1.0 - 0.9f64.powi(10);
    assert!(
        (result.success_probability - expected).abs() < 0.05,
        "success {} vs {}",
        result.success_probability,
        expected
    );
    assert!(result.mean_attempts <= 10.0);
}

#[test]
fn test_seeded_simulation_is_reproducible() {
    let kb = kb();
    let life = RequiredModifier::new("maximum Life");
    let step = CraftingStep::new("transmutation", "transmute", Some(life), 0.25, 0.01);
    let strategy = Strategy::new("transmute", life_target(), vec![step]);

    let first = Simulator::new(&kb, SimConfig::seeded(5)).simulate_strategy(&strategy, 2_000).unwrap();
    let second = Simulator::new(&kb, SimConfig::seeded(5)).simulate_strategy(&strategy, 2_000).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_cost_objective_ranks_cheapest_first() {
    let engine = engine();
    let target = DesiredItem::new("Sapphire Ring")
        .with_modifier(RequiredModifier::new("maximum Life"))
        .with_modifier(RequiredModifier::new("Cold Resistance"));
    let config = OptimizerConfig {
        optimize_for: Objective::Cost,
        risk_tolerance: RiskTolerance::High,
        seed: Some(1234),
        ..EngineConfig::quick().optimizer
    };

    let set = engine.generate_strategies(&target, &config).unwrap();
    assert!(!set.is_empty(), "{:?}", set.reason);
    let costs: Vec<f64> = set
        .strategies
        .iter()
        .map(|s| s.total_cost.as_ref().unwrap().expected)
        .collect();
    assert!(costs.windows(2).all(|w| w[0] <= w[1]), "{:?}", costs);
}

#[test]
fn test_no_market_recommends_crafting() {
    let engine = engine();
    let target = life_target();
    let set = engine
        .generate_strategies(&target, &OptimizerConfig::heuristics_only())
        .unwrap();
    let best = set.best().unwrap();

    let rec = engine.compare_craft_vs_buy(&target, best);
    assert_eq!(rec.recommendation, CraftVerdict::Craft);
    assert!(rec.reasoning.contains("No market data"));
    assert!(rec.market_price.is_none());
}

#[test]
fn test_higher_tier_exalt_never_worsens_tiers() {
    let kb = kb();
    let applier = ActionApplier::new(&kb);
    let mut rng = ChaCha8Rng::seed_from_u64(21);

    let mut average_tier = |action_id: &str| {
        let action = kb.action(action_id).unwrap();
        let mut total = 0u32;
        let mut count = 0u32;
        for _ in 0..2_000 {
            let mut item = applier.fresh_item("Sapphire Ring", 82, &mut rng).unwrap();
            item.rarity = Rarity::Rare;
            let next = applier.apply(action, &item, &mut rng).unwrap();
            if let Some(added) = next.affixes().next() {
                total += added.tier() as u32;
                count += 1;
            };
        }
        assert!(count > 0, "{} never added a modifier", action_id);
        total as f64 / count as f64
    };

    let basic = average_tier("exalted");
    let greater = average_tier("greater_exalted");
    let perfect = average_tier("perfect_exalted");
    assert!(greater <= basic, "greater {} vs basic {}", greater, basic);
    assert!(perfect <= greater, "perfect {} vs greater {}", perfect, greater);
}

#[test]
fn test_random_action_sequences_keep_invariants() {
    let kb = kb();
    let applier = ActionApplier::new(&kb);
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let actions: Vec<_> = kb.actions().iter().collect();

    for base in ["Sapphire Ring", "Full Plate", "Recurve Bow"] {
        for _ in 0..100 {
            let mut item = applier.fresh_item(base, 82, &mut rng).unwrap();
            for _ in 0..30 {
                let action = actions.choose(&mut rng).unwrap();
                item = applier.apply(action, &item, &mut rng).unwrap();
                assert!(item.prefixes.len() <= MAX_AFFIXES_PER_SIDE);
                assert!(item.suffixes.len() <= MAX_AFFIXES_PER_SIDE);
                assert!(item.check_invariants(), "{} broke {}", action.id, item.summary());
            }
        }
    }
}

#[test]
fn test_impossible_modifier_is_reported() {
    let engine = engine();
    let target = life_target().with_modifier(RequiredModifier::new("Spell Suppression"));
    let err = engine
        .generate_strategies(&target, &OptimizerConfig::heuristics_only())
        .unwrap_err();
    match err {
        CraftError::Infeasible { unmet } => assert_eq!(unmet, vec!["Spell Suppression".to_string()]),
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn test_report_round_trips_through_json() {
    let engine = engine();
    let target = engine
        .parse_target("(base_type: \"Sapphire Ring\", required: [(pattern: \"maximum Life\")])")
        .unwrap();
    let set = engine.generate_default(&target).unwrap();
    let report = engine.export_report(set.best().unwrap());

    let json = report.to_json().unwrap();
    let back: craftplan::StrategyReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.strategy, report.strategy);
    assert_eq!(back.steps.len(), report.steps.len());
}
