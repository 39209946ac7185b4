//! Built-in crafting catalog
//!
//! Hardcoded fallback used when no `catalog.ron` is found. Values are in
//! Exalted Orbs and follow the rough shape of the live economy; they only
//! matter as conservative fallbacks when the price oracle has nothing.

use crate::catalog::{
    ActionOutcomes, AffixSlot, Catalog, CostDescriptor, CraftingAction, Currency, CurrencyAmount,
    CurrencyTier, ItemBase, Modifier, Op, Outcome, Requirement, SideFilter, SlotRequirement,
    SpawnWeight, TagAffinity, ValueRange, WeightedOutcome,
};
use crate::items::{Rarity, MAX_QUALITY};

/// One tier row: (tier, required level, spawn weight, value ranges)
type TierRow<'a> = (u8, u32, u32, &'a [(i32, i32)]);

/// Expand a modifier family into one catalog entry per tier
fn family(
    id: &str,
    group: &str,
    slot: AffixSlot,
    text: &str,
    tags: &[&str],
    spawn_on: &[&str],
    rows: &[TierRow],
) -> Vec<Modifier> {
    rows.iter()
        .map(|&(tier, required_level, weight, values)| Modifier {
            id: format!("{}_t{}", id, tier),
            text: text.to_string(),
            slot,
            tier,
            required_level,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            values: values.iter().map(|&(min, max)| ValueRange::new(min, max)).collect(),
            group: group.to_string(),
            spawn_weights: spawn_on
                .iter()
                .map(|tag| SpawnWeight {
                    tag: tag.to_string(),
                    weight,
                })
                .collect(),
            affinities: Vec::new(),
        })
        .collect()
}

fn implicit(id: &str, text: &str, tags: &[&str], values: &[(i32, i32)]) -> Modifier {
    Modifier {
        id: id.to_string(),
        text: text.to_string(),
        slot: AffixSlot::Implicit,
        tier: 1,
        required_level: 1,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        values: values.iter().map(|&(min, max)| ValueRange::new(min, max)).collect(),
        group: format!("Implicit_{}", id),
        spawn_weights: Vec::new(),
        affinities: Vec::new(),
    }
}

fn default_modifiers() -> Vec<Modifier> {
    let jewellery = ["ring", "amulet", "belt"];
    let mut mods = Vec::new();

    // === PREFIXES ===
    mods.extend(family(
        "life",
        "IncreasedLife",
        AffixSlot::Prefix,
        "+{} to maximum Life",
        &["life", "resource"],
        &["ring", "amulet", "belt", "body_armour"],
        &[
            (1, 75, 200, &[(70, 84)]),
            (2, 60, 400, &[(55, 69)]),
            (3, 46, 600, &[(40, 54)]),
            (4, 24, 800, &[(25, 39)]),
            (5, 11, 1000, &[(15, 24)]),
            (6, 1, 1000, &[(10, 14)]),
        ],
    ));
    mods.extend(family(
        "mana",
        "IncreasedMana",
        AffixSlot::Prefix,
        "+{} to maximum Mana",
        &["mana", "resource"],
        &jewellery,
        &[
            (1, 75, 200, &[(65, 79)]),
            (2, 54, 500, &[(45, 64)]),
            (3, 24, 800, &[(25, 44)]),
            (4, 1, 1000, &[(10, 24)]),
        ],
    ));
    mods.extend(family(
        "added_cold",
        "AddedColdDamage",
        AffixSlot::Prefix,
        "Adds {} to {} Cold damage to Attacks",
        &["damage", "elemental", "cold", "attack"],
        &["ring", "bow"],
        &[
            (1, 68, 300, &[(9, 12), (18, 22)]),
            (2, 36, 700, &[(5, 7), (10, 13)]),
            (3, 1, 1000, &[(1, 2), (3, 5)]),
        ],
    ));
    mods.extend(family(
        "added_fire",
        "AddedFireDamage",
        AffixSlot::Prefix,
        "Adds {} to {} Fire damage to Attacks",
        &["damage", "elemental", "fire", "attack"],
        &["ring", "bow"],
        &[
            (1, 68, 300, &[(10, 14), (20, 25)]),
            (2, 36, 700, &[(6, 8), (11, 14)]),
            (3, 1, 1000, &[(1, 3), (4, 6)]),
        ],
    ));
    mods.extend(family(
        "item_rarity",
        "ItemFoundRarityIncrease",
        AffixSlot::Prefix,
        "{}% increased Rarity of Items found",
        &["drop"],
        &["ring", "amulet"],
        &[(1, 75, 250, &[(15, 18)]), (2, 46, 600, &[(10, 14)]), (3, 1, 1000, &[(6, 9)])],
    ));
    mods.extend(family(
        "local_physical",
        "LocalPhysicalDamagePercent",
        AffixSlot::Prefix,
        "{}% increased Physical Damage",
        &["damage", "physical", "attack"],
        &["bow"],
        &[
            (1, 75, 200, &[(155, 169)]),
            (2, 60, 500, &[(135, 154)]),
            (3, 36, 800, &[(85, 109)]),
            (4, 1, 1000, &[(40, 49)]),
        ],
    ));
    mods.extend(family(
        "local_armour",
        "LocalArmourPercent",
        AffixSlot::Prefix,
        "{}% increased Armour",
        &["defences", "armour"],
        &["body_armour"],
        &[(1, 75, 300, &[(91, 100)]), (2, 46, 700, &[(56, 67)]), (3, 1, 1000, &[(15, 26)])],
    ));

    // === SUFFIXES ===
    let resist_bases = ["ring", "amulet", "belt", "body_armour"];
    for (id, group, element) in [
        ("cold_res", "ColdResistance", "Cold"),
        ("fire_res", "FireResistance", "Fire"),
        ("lightning_res", "LightningResistance", "Lightning"),
    ] {
        let text = format!("+{{}}% to {} Resistance", element);
        let element_tag = element.to_lowercase();
        mods.extend(family(
            id,
            group,
            AffixSlot::Suffix,
            &text,
            &["elemental", element_tag.as_str(), "resistance"],
            &resist_bases,
            &[
                (1, 71, 300, &[(41, 45)]),
                (2, 60, 500, &[(36, 40)]),
                (3, 36, 800, &[(26, 30)]),
                (4, 12, 1000, &[(16, 20)]),
                (5, 1, 1000, &[(6, 10)]),
            ],
        ));
    }
    mods.extend(family(
        "chaos_res",
        "ChaosResistance",
        AffixSlot::Suffix,
        "+{}% to Chaos Resistance",
        &["chaos", "resistance"],
        &resist_bases,
        &[(1, 68, 100, &[(24, 27)]), (2, 46, 200, &[(16, 19)]), (3, 16, 250, &[(4, 7)])],
    ));
    for (id, group, attribute, spawn_on) in [
        ("strength", "Strength", "Strength", &["ring", "amulet", "belt", "body_armour"][..]),
        ("dexterity", "Dexterity", "Dexterity", &["ring", "amulet", "bow"][..]),
        ("intelligence", "Intelligence", "Intelligence", &["ring", "amulet"][..]),
    ] {
        let text = format!("+{{}} to {}", attribute);
        mods.extend(family(
            id,
            group,
            AffixSlot::Suffix,
            &text,
            &["attribute"],
            spawn_on,
            &[(1, 74, 300, &[(28, 30)]), (2, 46, 700, &[(18, 22)]), (3, 1, 1000, &[(5, 8)])],
        ));
    }
    mods.extend(family(
        "local_attack_speed",
        "LocalAttackSpeed",
        AffixSlot::Suffix,
        "{}% increased Attack Speed",
        &["attack", "speed"],
        &["bow"],
        &[(1, 75, 300, &[(20, 22)]), (2, 46, 600, &[(14, 16)]), (3, 1, 1000, &[(5, 7)])],
    ));

    // Bows favour attack damage
    for m in mods.iter_mut().filter(|m| m.tags.iter().any(|t| t == "attack")) {
        m.affinities.push(TagAffinity {
            tag: "bow".to_string(),
            multiplier: 1.5,
        });
    }

    // === IMPLICITS ===
    mods.push(implicit(
        "implicit_mana_regen",
        "{}% increased Mana Regeneration Rate",
        &["mana"],
        &[(20, 30)],
    ));
    mods.push(implicit(
        "implicit_fire_res",
        "+{}% to Fire Resistance",
        &["elemental", "fire", "resistance"],
        &[(20, 30)],
    ));
    mods.push(implicit(
        "implicit_spirit",
        "+{} to Spirit",
        &["spirit"],
        &[(10, 15)],
    ));
    mods.push(implicit(
        "implicit_flask_charges",
        "{}% increased Flask Charges gained",
        &["flask"],
        &[(20, 30)],
    ));
    mods.push(implicit(
        "vaal_all_res",
        "+{}% to all Elemental Resistances",
        &["elemental", "resistance"],
        &[(8, 12)],
    ));
    mods
}

fn default_bases() -> Vec<ItemBase> {
    let tags = |list: &[&str]| list.iter().map(|t| t.to_string()).collect::<Vec<String>>();
    vec![
        ItemBase {
            id: "Sapphire Ring".to_string(),
            item_class: "Ring".to_string(),
            tags: tags(&["ring", "default"]),
            implicit: Some("implicit_mana_regen".to_string()),
            drop_level: 8,
        },
        ItemBase {
            id: "Ruby Ring".to_string(),
            item_class: "Ring".to_string(),
            tags: tags(&["ring", "default"]),
            implicit: Some("implicit_fire_res".to_string()),
            drop_level: 8,
        },
        ItemBase {
            id: "Gold Amulet".to_string(),
            item_class: "Amulet".to_string(),
            tags: tags(&["amulet", "default"]),
            implicit: Some("implicit_spirit".to_string()),
            drop_level: 40,
        },
        ItemBase {
            id: "Heavy Belt".to_string(),
            item_class: "Belt".to_string(),
            tags: tags(&["belt", "default"]),
            implicit: Some("implicit_flask_charges".to_string()),
            drop_level: 8,
        },
        ItemBase {
            id: "Full Plate".to_string(),
            item_class: "Body Armour".to_string(),
            tags: tags(&["body_armour", "armour", "str_armour", "default"]),
            implicit: None,
            drop_level: 45,
        },
        ItemBase {
            id: "Recurve Bow".to_string(),
            item_class: "Bow".to_string(),
            tags: tags(&["bow", "weapon", "ranged", "two_hand_weapon", "default"]),
            implicit: None,
            drop_level: 16,
        },
    ]
}

fn default_currencies() -> Vec<Currency> {
    [
        ("transmutation", "Orb of Transmutation", 0.01),
        ("augmentation", "Orb of Augmentation", 0.02),
        ("regal", "Regal Orb", 0.3),
        ("alchemy", "Orb of Alchemy", 0.15),
        ("exalted", "Exalted Orb", 1.0),
        ("greater_exalted", "Greater Exalted Orb", 6.0),
        ("perfect_exalted", "Perfect Exalted Orb", 40.0),
        ("chaos", "Chaos Orb", 0.8),
        ("annulment", "Orb of Annulment", 5.0),
        ("divine", "Divine Orb", 120.0),
        ("vaal", "Vaal Orb", 0.5),
        ("essence_of_the_body", "Essence of the Body", 0.4),
        ("greater_essence_of_ice", "Greater Essence of Ice", 2.5),
        ("omen_of_sinistral_exaltation", "Omen of Sinistral Exaltation", 18.0),
        ("omen_of_dextral_exaltation", "Omen of Dextral Exaltation", 14.0),
        ("armourers_scrap", "Armourer's Scrap", 0.02),
        ("blacksmiths_whetstone", "Blacksmith's Whetstone", 0.03),
    ]
    .into_iter()
    .map(|(id, name, reference_value)| Currency {
        id: id.to_string(),
        name: name.to_string(),
        reference_value,
    })
    .collect()
}

/// Single-outcome weighted action (random draw, one way to land)
fn single(label: &str, ops: Vec<Op>) -> ActionOutcomes {
    ActionOutcomes::Weighted(vec![WeightedOutcome {
        weight: 1.0,
        outcome: Outcome::new(label, ops),
    }])
}

fn action(
    id: &str,
    name: &str,
    requirement: Requirement,
    outcomes: ActionOutcomes,
    cost: CostDescriptor,
) -> CraftingAction {
    CraftingAction {
        id: id.to_string(),
        name: name.to_string(),
        tier: CurrencyTier::Basic,
        requirement,
        outcomes,
        cost,
        tags: Vec::new(),
    }
}

fn default_actions() -> Vec<CraftingAction> {
    let any = || Op::add_random(SideFilter::Any);
    let affixed = || Requirement::rarity(&[Rarity::Magic, Rarity::Rare]).needing_affix();
    let rare_with_room = |slot| Requirement::rarity(&[Rarity::Rare]).with_open_slot(slot);
    let tags = |list: &[&str]| list.iter().map(|t| t.to_string()).collect::<Vec<_>>();

    let mut actions = vec![
        action(
            "transmutation",
            "Orb of Transmutation",
            Requirement::rarity(&[Rarity::Normal]),
            single("magic with one modifier", vec![Op::SetRarity(Rarity::Magic), any()]),
            CostDescriptor::single("transmutation", 1.0),
        ),
        action(
            "augmentation",
            "Orb of Augmentation",
            Requirement::rarity(&[Rarity::Magic]).with_open_slot(SlotRequirement::Either),
            single("add a modifier", vec![any()]),
            CostDescriptor::single("augmentation", 1.0),
        ),
        action(
            "regal",
            "Regal Orb",
            Requirement::rarity(&[Rarity::Magic]),
            single("rare with one more modifier", vec![Op::SetRarity(Rarity::Rare), any()]),
            CostDescriptor::single("regal", 1.0),
        ),
        action(
            "alchemy",
            "Orb of Alchemy",
            Requirement::rarity(&[Rarity::Normal]),
            single(
                "rare with four modifiers",
                vec![Op::SetRarity(Rarity::Rare), any(), any(), any(), any()],
            ),
            CostDescriptor::single("alchemy", 1.0),
        ),
        action(
            "exalted",
            "Exalted Orb",
            rare_with_room(SlotRequirement::Either),
            single("add a modifier", vec![any()]),
            CostDescriptor::single("exalted", 1.0),
        ),
        CraftingAction {
            tier: CurrencyTier::Greater,
            ..action(
                "greater_exalted",
                "Greater Exalted Orb",
                rare_with_room(SlotRequirement::Either).with_min_level(35),
                single("add a tier 4 or better modifier", vec![Op::add_random_tiered(SideFilter::Any, 4)]),
                CostDescriptor::single("greater_exalted", 1.0),
            )
        },
        CraftingAction {
            tier: CurrencyTier::Perfect,
            ..action(
                "perfect_exalted",
                "Perfect Exalted Orb",
                rare_with_room(SlotRequirement::Either).with_min_level(50),
                single("add a tier 2 or better modifier", vec![Op::add_random_tiered(SideFilter::Any, 2)]),
                CostDescriptor::single("perfect_exalted", 1.0),
            )
        },
        action(
            "sinistral_exalted",
            "Exalted Orb with Omen of Sinistral Exaltation",
            rare_with_room(SlotRequirement::Prefix),
            single("add a prefix", vec![Op::add_random(SideFilter::Prefix)]),
            CostDescriptor::Currency(vec![
                CurrencyAmount {
                    currency: "exalted".to_string(),
                    amount: 1.0,
                },
                CurrencyAmount {
                    currency: "omen_of_sinistral_exaltation".to_string(),
                    amount: 1.0,
                },
            ]),
        ),
        action(
            "dextral_exalted",
            "Exalted Orb with Omen of Dextral Exaltation",
            rare_with_room(SlotRequirement::Suffix),
            single("add a suffix", vec![Op::add_random(SideFilter::Suffix)]),
            CostDescriptor::Currency(vec![
                CurrencyAmount {
                    currency: "exalted".to_string(),
                    amount: 1.0,
                },
                CurrencyAmount {
                    currency: "omen_of_dextral_exaltation".to_string(),
                    amount: 1.0,
                },
            ]),
        ),
        action(
            "chaos",
            "Chaos Orb",
            Requirement::rarity(&[Rarity::Rare]).needing_affix(),
            single("replace a modifier", vec![Op::RemoveRandom, any()]),
            CostDescriptor::single("chaos", 1.0),
        ),
        action(
            "annulment",
            "Orb of Annulment",
            affixed(),
            single("remove a modifier", vec![Op::RemoveRandom]),
            CostDescriptor::single("annulment", 1.0),
        ),
        action(
            "divine",
            "Divine Orb",
            affixed(),
            single("reroll modifier values", vec![Op::RerollValues]),
            CostDescriptor::single("divine", 1.0),
        ),
        action(
            "vaal",
            "Vaal Orb",
            Requirement::rarity(&[Rarity::Magic, Rarity::Rare]),
            ActionOutcomes::Corrupting(vec![
                WeightedOutcome {
                    weight: 1.0,
                    outcome: Outcome::new("no change", vec![Op::Corrupt]),
                },
                WeightedOutcome {
                    weight: 1.0,
                    outcome: Outcome::new("reroll values", vec![Op::RerollValues, Op::Corrupt]),
                },
                WeightedOutcome {
                    weight: 1.0,
                    outcome: Outcome::new(
                        "corrupted implicit",
                        vec![Op::SetImplicit("vaal_all_res".to_string()), Op::Corrupt],
                    ),
                },
                WeightedOutcome {
                    weight: 1.0,
                    outcome: Outcome::new("add a modifier", vec![any(), Op::Corrupt]),
                },
            ]),
            CostDescriptor::single("vaal", 1.0),
        ),
        CraftingAction {
            tags: tags(&["life", "resource"]),
            ..action(
                "essence_body",
                "Essence of the Body",
                Requirement::rarity(&[Rarity::Normal]),
                ActionOutcomes::Deterministic(Outcome::new(
                    "magic with guaranteed life",
                    vec![Op::SetRarity(Rarity::Magic), Op::AddSpecific("life_t4".to_string())],
                )),
                CostDescriptor::single("essence_of_the_body", 1.0),
            )
        },
        CraftingAction {
            tier: CurrencyTier::Greater,
            tags: tags(&["cold", "resistance"]),
            ..action(
                "greater_essence_ice",
                "Greater Essence of Ice",
                Requirement::rarity(&[Rarity::Magic]),
                ActionOutcomes::Deterministic(Outcome::new(
                    "rare with guaranteed cold resistance",
                    vec![Op::SetRarity(Rarity::Rare), Op::AddSpecific("cold_res_t3".to_string())],
                )),
                CostDescriptor::single("greater_essence_of_ice", 1.0),
            )
        },
    ];

    for (id, name, currency, tag) in [
        ("armourers_scrap", "Armourer's Scrap", "armourers_scrap", "armour"),
        ("blacksmiths_whetstone", "Blacksmith's Whetstone", "blacksmiths_whetstone", "weapon"),
    ] {
        let mut requirement = Requirement::default().with_tags(&[tag]);
        requirement.quality_below = Some(MAX_QUALITY);
        actions.push(action(
            id,
            name,
            requirement,
            ActionOutcomes::Deterministic(Outcome::new("add quality", vec![Op::AddQuality(5)])),
            CostDescriptor::single(currency, 1.0),
        ));
    }
    actions
}

/// Pool levels: every distinct modifier level, so each unlock has a pool
fn pool_levels(modifiers: &[Modifier]) -> Vec<u32> {
    let mut levels: Vec<u32> = modifiers.iter().map(|m| m.required_level).collect();
    levels.push(1);
    levels.sort_unstable();
    levels.dedup();
    levels
}

/// Create the default catalog (hardcoded fallback)
pub fn default_catalog() -> Catalog {
    let modifiers = default_modifiers();
    Catalog {
        currencies: default_currencies(),
        bases: default_bases(),
        pool_levels: pool_levels(&modifiers),
        modifiers,
        actions: default_actions(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_modifier_ids_unique() {
        let mods = default_modifiers();
        let ids: HashSet<&str> = mods.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), mods.len());
    }

    #[test]
    fn test_family_expands_tiers() {
        let mods = default_modifiers();
        let life: Vec<&Modifier> = mods.iter().filter(|m| m.group == "IncreasedLife").collect();
        assert_eq!(life.len(), 6);
        assert!(life.iter().any(|m| m.values[0].contains(60)));
        let cold = mods.iter().find(|m| m.id == "cold_res_t3").unwrap();
        assert_eq!(cold.text, "+{}% to Cold Resistance");
    }

    #[test]
    fn test_pool_levels_start_at_one() {
        let catalog = default_catalog();
        assert_eq!(catalog.pool_levels.first(), Some(&1));
        assert!(catalog.pool_levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_transmutation_is_cheapest() {
        let currencies = default_currencies();
        let cheapest = currencies
            .iter()
            .min_by(|a, b| a.reference_value.total_cmp(&b.reference_value))
            .unwrap();
        assert_eq!(cheapest.id, "transmutation");
    }
}
