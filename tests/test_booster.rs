//! Pack composition tests: slot layout, duplicate policy, holo rolls and
//! the pity counter.

mod common;

use std::collections::HashSet;

use booster_binder::booster::simulator::compose;
use booster_binder::{
    BinderError, CardCatalog, PackConfig, PackOptions, PackRng, PackSimulator, Rarity, SlotType,
};

fn config(rare: u32, uncommon: u32, common: u32) -> PackConfig {
    PackConfig {
        rare_slots: rare,
        uncommon_slots: uncommon,
        common_slots: common,
        ..PackConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[test]
fn default_pack_has_ten_slots_rare_first() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let mut rng = PackRng::seeded(1);

    let composed = compose(&pool, &PackConfig::default(), 0, &mut rng, false).unwrap();
    let pack = composed.pack;

    assert_eq!(pack.slots.len(), 10);
    assert_eq!(pack.summary.total_cards, 10);
    assert_eq!(pack.slots[0].slot_type, SlotType::Rare);
    assert!(pack.slots[1..4].iter().all(|s| s.slot_type == SlotType::Uncommon));
    assert!(pack.slots[4..].iter().all(|s| s.slot_type == SlotType::Common));

    let indexes: Vec<u32> = pack.slots.iter().map(|s| s.slot_index).collect();
    assert_eq!(indexes, (1..=10).collect::<Vec<u32>>());
    assert!(pack.debug.is_none());
}

#[test]
fn slot_count_matches_config() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    for (r, u, c) in [(0, 0, 1), (2, 2, 2), (3, 0, 11), (1, 5, 0)] {
        let mut rng = PackRng::seeded(7);
        let composed = compose(&pool, &config(r, u, c), 0, &mut rng, false).unwrap();
        assert_eq!(composed.pack.slots.len(), (r + u + c) as usize);
    }
}

#[test]
fn slots_draw_from_their_bucket() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let mut rng = PackRng::seeded(99);
    let cfg = PackConfig {
        holo_upgrade_chance: 0.0,
        ..PackConfig::default()
    };

    for _ in 0..50 {
        let pack = compose(&pool, &cfg, 0, &mut rng, false).unwrap().pack;
        for slot in &pack.slots {
            assert_eq!(pool.rarity_of(&slot.card_id), Some(slot.rarity));
            assert_eq!(slot.rarity, slot.slot_type.base_rarity());
            assert!(!slot.is_new && !slot.is_duplicate);
        }
    }
}

// ---------------------------------------------------------------------------
// Duplicate policy
// ---------------------------------------------------------------------------

#[test]
fn no_duplicates_within_bucket_when_disallowed() {
    let pool = common::pool("base2", [6, 3, 2, 1]);
    let cfg = PackConfig {
        rare_slots: 2,
        uncommon_slots: 3,
        common_slots: 6,
        allow_duplicates_within_pack: false,
        holo_upgrade_chance: 0.0,
        pity_after_packs: None,
    };

    for seed in 0..25 {
        let mut rng = PackRng::seeded(seed);
        let pack = compose(&pool, &cfg, 0, &mut rng, false).unwrap().pack;
        let commons: HashSet<&str> = pack
            .slots
            .iter()
            .filter(|s| s.slot_type == SlotType::Common)
            .map(|s| s.card_id.as_str())
            .collect();
        assert_eq!(commons.len(), 6);
        let all: HashSet<&str> = pack.slots.iter().map(|s| s.card_id.as_str()).collect();
        assert_eq!(all.len(), pack.slots.len());
    }
}

#[test]
fn too_many_slots_without_duplicates_is_insufficient_pool() {
    let pool = common::pool("base2", [6, 3, 2, 1]);
    let cfg = PackConfig {
        common_slots: 7,
        allow_duplicates_within_pack: false,
        ..PackConfig::default()
    };
    let mut rng = PackRng::seeded(3);

    let err = compose(&pool, &cfg, 0, &mut rng, false).unwrap_err();
    match err {
        BinderError::InsufficientPool {
            set_id,
            bucket,
            requested,
            available,
        } => {
            assert_eq!(set_id, "base2");
            assert_eq!(bucket, "common");
            assert_eq!(requested, 7);
            assert_eq!(available, 6);
        }
        other => panic!("expected InsufficientPool, got {other:?}"),
    }
}

#[test]
fn empty_bucket_with_slots_is_insufficient_even_with_duplicates() {
    let pool = common::pool("base2", [6, 0, 2, 1]);
    let mut rng = PackRng::seeded(3);

    let err = compose(&pool, &PackConfig::default(), 0, &mut rng, false).unwrap_err();
    assert!(matches!(
        err,
        BinderError::InsufficientPool { ref bucket, available: 0, .. } if bucket == "uncommon"
    ));
}

#[test]
fn duplicates_allowed_can_exceed_bucket_size() {
    let pool = common::pool("tiny", [1, 1, 1, 0]);
    let mut rng = PackRng::seeded(5);

    let pack = compose(&pool, &config(0, 0, 4), 0, &mut rng, false)
        .unwrap()
        .pack;
    assert!(pack.slots.iter().all(|s| s.card_id == "tiny-c01"));
}

// ---------------------------------------------------------------------------
// Config validation
// ---------------------------------------------------------------------------

#[test]
fn invalid_configs_are_rejected_before_drawing() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let bad = [
        PackConfig {
            holo_upgrade_chance: 1.5,
            ..PackConfig::default()
        },
        PackConfig {
            holo_upgrade_chance: -0.1,
            ..PackConfig::default()
        },
        PackConfig {
            holo_upgrade_chance: f64::NAN,
            ..PackConfig::default()
        },
        PackConfig {
            pity_after_packs: Some(0),
            ..PackConfig::default()
        },
        config(0, 0, 0),
    ];

    for cfg in bad {
        let mut rng = PackRng::seeded(1);
        let err = compose(&pool, &cfg, 0, &mut rng, false).unwrap_err();
        assert!(matches!(err, BinderError::InvalidConfig(_)), "{cfg:?}");
    }
}

#[test]
fn config_from_json_fills_defaults_and_rejects_bad_fields() {
    let cfg = PackConfig::from_value(&serde_json::json!({ "rare_slots": 2 })).unwrap();
    assert_eq!(cfg.rare_slots, 2);
    assert_eq!(cfg.common_slots, 6);

    for raw in [
        serde_json::json!({ "rare_slots": -1 }),
        serde_json::json!({ "common_slots": "six" }),
        serde_json::json!({ "booster_type": "draft" }),
        serde_json::json!({ "holo_upgrade_chance": 2.0 }),
    ] {
        let err = PackConfig::from_value(&raw).unwrap_err();
        assert!(matches!(err, BinderError::InvalidConfig(_)), "{raw}");
    }
}

// ---------------------------------------------------------------------------
// Holo upgrades
// ---------------------------------------------------------------------------

#[test]
fn same_seed_same_pack() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let first = compose(&pool, &PackConfig::default(), 0, &mut PackRng::seeded(42), true).unwrap();
    let second = compose(&pool, &PackConfig::default(), 0, &mut PackRng::seeded(42), true).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.pack.seed, Some(42));
}

#[test]
fn holo_rate_converges_to_configured_chance() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let cfg = PackConfig {
        holo_upgrade_chance: 0.25,
        ..config(1, 0, 1)
    };
    let mut rng = PackRng::seeded(2024);

    let trials = 4000;
    let mut upgrades = 0;
    for _ in 0..trials {
        upgrades += compose(&pool, &cfg, 0, &mut rng, false).unwrap().holo_upgrades;
    }
    let rate = upgrades as f64 / trials as f64;
    assert!((0.22..=0.28).contains(&rate), "holo rate {rate}");
}

#[test]
fn chance_bounds_are_never_and_always() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let mut rng = PackRng::seeded(11);

    let never = PackConfig {
        holo_upgrade_chance: 0.0,
        ..config(3, 0, 0)
    };
    let always = PackConfig {
        holo_upgrade_chance: 1.0,
        ..config(3, 0, 0)
    };

    for _ in 0..100 {
        let pack = compose(&pool, &never, 0, &mut rng, false).unwrap().pack;
        assert!(pack.slots.iter().all(|s| s.rarity == Rarity::Rare));
        let pack = compose(&pool, &always, 0, &mut rng, false).unwrap().pack;
        assert!(pack.slots.iter().all(|s| s.rarity == Rarity::Holo));
    }
}

#[test]
fn upgraded_slot_takes_a_holo_card() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let cfg = PackConfig {
        holo_upgrade_chance: 1.0,
        ..PackConfig::default()
    };
    let composed = compose(&pool, &cfg, 4, &mut PackRng::seeded(8), true).unwrap();

    let slot = &composed.pack.slots[0];
    assert_eq!(slot.slot_type, SlotType::Rare);
    assert_eq!(slot.rarity, Rarity::Holo);
    assert!(slot.is_upgraded());
    assert!(pool.bucket(Rarity::Holo).contains(&slot.card_id));
    assert_eq!(composed.pity_counter_after, 0);

    let debug = composed.pack.debug.unwrap();
    assert_eq!(debug.rare_slot_rolls.len(), 1);
    assert!(debug.rare_slot_rolls[0].upgraded_to_holo);
    assert!(debug.rare_slot_rolls[0].roll.is_some());
    assert_eq!(debug.pity_counter_before, 4);
}

#[test]
fn empty_holo_bucket_keeps_slot_rare() {
    let pool = common::pool("base2", [6, 3, 2, 0]);
    let cfg = PackConfig {
        holo_upgrade_chance: 1.0,
        ..PackConfig::default()
    };
    let composed = compose(&pool, &cfg, 2, &mut PackRng::seeded(8), false).unwrap();

    assert_eq!(composed.pack.slots[0].rarity, Rarity::Rare);
    assert_eq!(composed.holo_upgrades, 0);
    assert_eq!(composed.pity_counter_after, 3);
}

// ---------------------------------------------------------------------------
// Pity
// ---------------------------------------------------------------------------

#[test]
fn pity_forces_first_rare_slot_after_n_blank_packs() {
    let pool = common::pool("base2", [60, 25, 10, 5]);
    let cfg = PackConfig {
        holo_upgrade_chance: 0.0,
        pity_after_packs: Some(3),
        ..config(2, 3, 5)
    };
    let mut rng = PackRng::seeded(77);
    let mut counter = 0;

    for expected in 1..=3 {
        let composed = compose(&pool, &cfg, counter, &mut rng, false).unwrap();
        assert_eq!(composed.holo_upgrades, 0);
        counter = composed.pity_counter_after;
        assert_eq!(counter, expected);
    }

    let composed = compose(&pool, &cfg, counter, &mut rng, true).unwrap();
    assert_eq!(composed.pack.slots[0].rarity, Rarity::Holo);
    assert_eq!(composed.pack.slots[1].rarity, Rarity::Rare);
    assert_eq!(composed.pity_counter_after, 0);

    let rolls = composed.pack.debug.unwrap().rare_slot_rolls;
    assert!(rolls[0].pity_forced);
    assert_eq!(rolls[0].roll, None);
    assert!(!rolls[1].pity_forced);
    assert!(rolls[1].roll.is_some());
}

#[test]
fn sdk_persists_pity_counter_between_packs() {
    let fx = common::setup();
    let cfg = PackConfig {
        holo_upgrade_chance: 0.0,
        pity_after_packs: Some(2),
        ..PackConfig::default()
    };

    fx.sdk.open_pack("base2", &cfg, PackOptions::seeded(1)).unwrap();
    fx.sdk.open_pack("base2", &cfg, PackOptions::seeded(2)).unwrap();
    assert_eq!(fx.sdk.pity_counter("base2"), 2);
    assert_eq!(fx.sdk.pity_counter("jungle"), 0);

    let pack = fx.sdk.open_pack("base2", &cfg, PackOptions::seeded(3)).unwrap();
    assert_eq!(pack.slots[0].rarity, Rarity::Holo);
    assert_eq!(fx.sdk.pity_counter("base2"), 0);
}

// ---------------------------------------------------------------------------
// SDK pack opening
// ---------------------------------------------------------------------------

#[test]
fn open_pack_previews_against_binder_without_recording() {
    let sdk = common::memory_sdk(
        vec![common::pool("solo", [1, 0, 0, 0])],
        common::progression(&["solo"]),
    );
    let cfg = config(0, 0, 3);

    let pack = sdk.open_pack("solo", &cfg, PackOptions::seeded(1)).unwrap();
    let flags: Vec<(bool, bool)> = pack.slots.iter().map(|s| (s.is_new, s.is_duplicate)).collect();
    assert_eq!(flags, vec![(true, false), (false, true), (false, true)]);
    assert_eq!(pack.summary.new_cards, 1);
    assert_eq!(pack.summary.duplicate_cards, 2);
    assert!(sdk.get_binder_state().cards.is_empty());
}

#[test]
fn open_box_seeds_each_pack_from_the_box_seed() {
    let fx = common::setup();
    let catalog = CardCatalog::open(fx.pools_dir()).unwrap();
    let cfg = PackConfig::default();

    let packs = fx.sdk.open_box("base2", &cfg, 5, PackOptions::seeded(7)).unwrap();
    assert_eq!(packs.len(), 5);

    let simulator = PackSimulator::new(&catalog);
    let third = simulator
        .open_pack("base2", &cfg, 0, &mut PackRng::seeded(9), false)
        .unwrap();
    let box_ids: Vec<&str> = packs[2].slots.iter().map(|s| s.card_id.as_str()).collect();
    let solo_ids: Vec<&str> = third.pack.slots.iter().map(|s| s.card_id.as_str()).collect();
    assert_eq!(box_ids, solo_ids);
    assert_eq!(packs[2].seed, Some(9));
}

#[test]
fn open_box_rejects_zero_packs() {
    let fx = common::setup();
    let err = fx
        .sdk
        .open_box("base2", &PackConfig::default(), 0, PackOptions::default())
        .unwrap_err();
    assert!(matches!(err, BinderError::InvalidArgument(_)));
}

#[test]
fn unknown_or_empty_set_id_fails() {
    let fx = common::setup();
    let cfg = PackConfig::default();

    let err = fx.sdk.open_pack("neo1", &cfg, PackOptions::default()).unwrap_err();
    assert!(matches!(err, BinderError::PoolNotFound(ref s) if s == "neo1"));

    let err = fx.sdk.open_pack("  ", &cfg, PackOptions::default()).unwrap_err();
    assert!(matches!(err, BinderError::InvalidArgument(_)));

    let err = fx.sdk.open_pack("../base2", &cfg, PackOptions::default()).unwrap_err();
    assert!(matches!(err, BinderError::PoolNotFound(_)));
}

#[test]
fn debug_option_attaches_rolls() {
    let fx = common::setup();
    let cfg = config(2, 3, 5);

    let pack = fx
        .sdk
        .open_pack("base2", &cfg, PackOptions::seeded(5).with_debug())
        .unwrap();
    let debug = pack.debug.unwrap();
    assert_eq!(debug.rare_slot_rolls.len(), 2);
    assert_eq!(debug.rare_slot_rolls[0].rare_slot_index, 1);
    assert_eq!(debug.rare_slot_rolls[1].rare_slot_index, 2);
}
