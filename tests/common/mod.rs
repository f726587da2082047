//! Shared test fixtures for the booster binder integration tests.
//!
//! Provides `setup()` which writes small rarity pools into a temporary
//! directory and builds a `BinderSdk` over them with a fixed clock and a
//! binder file inside the same directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use booster_binder::{
    BinderSdk, CardPool, FixedClock, PackConfig, PackResult, PackSlot, ProgressionConfig, Rarity,
    SlotType,
};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

/// Card ids of one bucket: `<set>-<prefix><nn>`, numbered from 1.
pub fn ids(set_id: &str, prefix: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|n| format!("{set_id}-{prefix}{n:02}"))
        .collect()
}

/// Write `<dir>/<set_id>.json` with buckets of the given sizes.
pub fn write_pool(dir: &Path, set_id: &str, sizes: [usize; 4]) {
    let [common, uncommon, rare, holo] = sizes;
    let doc = serde_json::json!({
        "set_id": set_id,
        "pools": {
            "common": ids(set_id, "c", common),
            "uncommon": ids(set_id, "u", uncommon),
            "rare": ids(set_id, "r", rare),
            "holo": ids(set_id, "h", holo),
        }
    });
    std::fs::write(
        dir.join(format!("{set_id}.json")),
        serde_json::to_string_pretty(&doc).unwrap(),
    )
    .unwrap();
}

/// An in-memory pool with the same id scheme as [`write_pool`].
pub fn pool(set_id: &str, sizes: [usize; 4]) -> CardPool {
    let [common, uncommon, rare, holo] = sizes;
    CardPool::new(
        set_id,
        ids(set_id, "c", common),
        ids(set_id, "u", uncommon),
        ids(set_id, "r", rare),
        ids(set_id, "h", holo),
    )
    .unwrap()
}

/// Progression over `order` with the default milestone rules.
pub fn progression(order: &[&str]) -> ProgressionConfig {
    ProgressionConfig {
        progression_order: order.iter().map(|s| s.to_string()).collect(),
        ..ProgressionConfig::default()
    }
}

/// A pack whose slots hold exactly `card_ids`, all common slots.
pub fn pack_of(set_id: &str, card_ids: &[&str]) -> PackResult {
    let mut pack = PackResult {
        set_id: set_id.to_string(),
        seed: None,
        config: PackConfig::default(),
        slots: card_ids
            .iter()
            .enumerate()
            .map(|(i, id)| PackSlot {
                slot_index: i as u32 + 1,
                slot_type: SlotType::Common,
                rarity: Rarity::Common,
                card_id: id.to_string(),
                is_new: false,
                is_duplicate: false,
            })
            .collect(),
        summary: Default::default(),
        debug: None,
    };
    pack.refresh_summary();
    pack
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ))
}

/// A built SDK plus the directory and clock behind it.
///
/// Keep the fixture alive for the duration of the test so the temporary
/// directory is not deleted prematurely.
pub struct Fixture {
    pub sdk: BinderSdk,
    pub clock: Arc<FixedClock>,
    pub tmp: TempDir,
    pub progression: ProgressionConfig,
}

impl Fixture {
    pub fn pools_dir(&self) -> PathBuf {
        self.tmp.path().join("pools")
    }

    pub fn binder_file(&self) -> PathBuf {
        self.tmp.path().join("data").join("binder_state.json")
    }

    /// Build a second SDK over the same pools and binder file, as after a
    /// restart.
    pub fn reopen(&self) -> BinderSdk {
        BinderSdk::builder()
            .pools_dir(self.pools_dir())
            .binder_file(self.binder_file())
            .progression(self.progression.clone())
            .clock(self.clock.clone())
            .build()
            .unwrap()
    }
}

/// `base2` with 100 cards (60/25/10/5) and `jungle` with 20 (10/5/3/2),
/// progression `[base2, jungle]`.
pub fn setup() -> Fixture {
    setup_with(progression(&["base2", "jungle"]))
}

pub fn setup_with(progression: ProgressionConfig) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let pools_dir = tmp.path().join("pools");
    std::fs::create_dir_all(&pools_dir).unwrap();
    write_pool(&pools_dir, "base2", [60, 25, 10, 5]);
    write_pool(&pools_dir, "jungle", [10, 5, 3, 2]);

    let clock = fixed_clock();
    let sdk = BinderSdk::builder()
        .pools_dir(&pools_dir)
        .binder_file(tmp.path().join("data").join("binder_state.json"))
        .progression(progression.clone())
        .clock(clock.clone())
        .build()
        .unwrap();

    Fixture {
        sdk,
        clock,
        tmp,
        progression,
    }
}

/// An SDK over in-memory pools and an in-memory binder.
pub fn memory_sdk(pools: Vec<CardPool>, progression: ProgressionConfig) -> BinderSdk {
    BinderSdk::builder()
        .pools(pools)
        .store(booster_binder::MemoryBinderStore::new())
        .progression(progression)
        .clock(fixed_clock())
        .build()
        .unwrap()
}
