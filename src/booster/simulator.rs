//! Booster pack simulator.
//!
//! Draws each slot of a pack uniformly from the set's rarity buckets, rolls
//! rare slots for a holo upgrade, and applies the pity rule that forces a
//! holo after a configured run of packs without one.

use crate::catalog::{CardCatalog, CardPool};
use crate::error::{BinderError, Result};
use crate::models::{
    PackConfig, PackDebug, PackResult, PackSlot, PackSummary, Rarity, RareSlotRoll, SlotType,
};
use crate::rng::PackRng;

/// A composed pack together with the set's pity counter after it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPack {
    pub pack: PackResult,
    pub pity_counter_after: u32,
    pub holo_upgrades: usize,
}

/// Opens packs against the pools of a [`CardCatalog`].
///
/// The simulator holds no state of its own: the caller passes in the set's
/// consecutive-no-holo counter and stores the returned one.
pub struct PackSimulator<'a> {
    catalog: &'a CardCatalog,
}

impl<'a> PackSimulator<'a> {
    /// Create a new `PackSimulator` bound to the given catalog.
    pub fn new(catalog: &'a CardCatalog) -> Self {
        Self { catalog }
    }

    /// Open a single pack of `set_id`.
    ///
    /// The config is validated before the pool is touched, and bucket sizes
    /// are checked before the first draw.
    pub fn open_pack(
        &self,
        set_id: &str,
        config: &PackConfig,
        pity_counter: u32,
        rng: &mut PackRng,
        debug: bool,
    ) -> Result<ComposedPack> {
        if set_id.trim().is_empty() {
            return Err(BinderError::InvalidArgument(
                "set_id must be a non-empty string".into(),
            ));
        }
        config.validate()?;
        let pool = self.catalog.load_pool(set_id)?;
        let composed = compose(&pool, config, pity_counter, rng, debug)?;

        tracing::info!(
            set_id,
            total_cards = composed.pack.summary.total_cards,
            holo_upgrades = composed.holo_upgrades,
            pity_counter_before = pity_counter,
            pity_counter_after = composed.pity_counter_after,
            seed = ?rng.seed(),
            "Generated pack"
        );
        Ok(composed)
    }

    /// Open `packs` packs in sequence, carrying the pity counter across them.
    ///
    /// With a seed, pack `i` is drawn from `seed + i` (wrapping), so any
    /// single pack of the box can be reproduced on its own.
    pub fn open_box(
        &self,
        set_id: &str,
        config: &PackConfig,
        packs: usize,
        pity_counter: u32,
        seed: Option<u64>,
        debug: bool,
    ) -> Result<Vec<ComposedPack>> {
        if packs == 0 {
            return Err(BinderError::InvalidArgument(
                "a box must contain at least one pack".into(),
            ));
        }
        let mut box_contents = Vec::with_capacity(packs);
        let mut counter = pity_counter;
        for i in 0..packs {
            let mut rng = PackRng::new(seed.map(|s| s.wrapping_add(i as u64)));
            let composed = self.open_pack(set_id, config, counter, &mut rng, debug)?;
            counter = composed.pity_counter_after;
            box_contents.push(composed);
        }
        Ok(box_contents)
    }
}

// ---------------------------------------------------------------------------
// Free-standing helpers
// ---------------------------------------------------------------------------

/// Compose one pack from an already loaded pool.
///
/// Slots are laid out rare first, then uncommon, then common. `is_new` and
/// `is_duplicate` are left false; they depend on the binder.
pub fn compose(
    pool: &CardPool,
    config: &PackConfig,
    pity_counter: u32,
    rng: &mut PackRng,
    debug: bool,
) -> Result<ComposedPack> {
    config.validate()?;
    check_capacity(pool, config)?;

    let allow_duplicates = config.allow_duplicates_within_pack;
    let mut rare = SheetPicker::new(pool.bucket(Rarity::Rare), allow_duplicates);
    let mut holo = SheetPicker::new(pool.bucket(Rarity::Holo), allow_duplicates);

    let pity_due = config
        .pity_after_packs
        .is_some_and(|after| pity_counter >= after);

    let mut slots: Vec<PackSlot> = Vec::with_capacity(config.total_slots());
    let mut rolls: Vec<RareSlotRoll> = Vec::with_capacity(config.rare_slots as usize);
    let mut upgrades = 0usize;

    for rare_slot_idx in 0..config.rare_slots {
        let drawn = rare
            .pick(rng)
            .ok_or_else(|| insufficient(pool, Rarity::Rare, config.rare_slots as usize))?;

        let pity_forced = pity_due && rare_slot_idx == 0;
        let roll = if pity_forced { None } else { Some(rng.roll()) };
        let wants_holo = pity_forced || roll.is_some_and(|r| r < config.holo_upgrade_chance);

        let holo_card = if wants_holo { holo.pick(rng) } else { None };
        if wants_holo && holo_card.is_none() {
            tracing::warn!(
                set_id = %pool.set_id,
                rare_slot = rare_slot_idx + 1,
                "No holo card left to upgrade to, slot stays rare"
            );
        }

        let (rarity, card_id) = match holo_card {
            Some(card) => {
                upgrades += 1;
                (Rarity::Holo, card.clone())
            }
            None => (Rarity::Rare, drawn.clone()),
        };

        tracing::debug!(
            rare_slot = rare_slot_idx + 1,
            roll = ?roll,
            threshold = config.holo_upgrade_chance,
            pity_forced,
            upgraded_to_holo = holo_card.is_some(),
            card_id = %card_id,
            "Rare slot"
        );

        rolls.push(RareSlotRoll {
            rare_slot_index: rare_slot_idx + 1,
            roll,
            threshold: config.holo_upgrade_chance,
            upgraded_to_holo: holo_card.is_some(),
            pity_forced,
        });
        slots.push(PackSlot {
            slot_index: slots.len() as u32 + 1,
            slot_type: SlotType::Rare,
            rarity,
            card_id,
            is_new: false,
            is_duplicate: false,
        });
    }

    for slot_type in [SlotType::Uncommon, SlotType::Common] {
        let rarity = slot_type.base_rarity();
        let requested = config.slots_for(slot_type);
        let mut picker = SheetPicker::new(pool.bucket(rarity), allow_duplicates);
        for _ in 0..requested {
            let card_id = picker
                .pick(rng)
                .ok_or_else(|| insufficient(pool, rarity, requested))?
                .clone();
            tracing::debug!(slot = slots.len() + 1, rarity = %rarity, card_id = %card_id, "Slot drawn");
            slots.push(PackSlot {
                slot_index: slots.len() as u32 + 1,
                slot_type,
                rarity,
                card_id,
                is_new: false,
                is_duplicate: false,
            });
        }
    }

    let pity_counter_after = if upgrades > 0 {
        0
    } else {
        pity_counter.saturating_add(1)
    };

    let summary = PackSummary {
        total_cards: slots.len(),
        new_cards: 0,
        duplicate_cards: 0,
    };

    Ok(ComposedPack {
        pack: PackResult {
            set_id: pool.set_id.clone(),
            seed: rng.seed(),
            config: config.clone(),
            slots,
            summary,
            debug: debug.then(|| PackDebug {
                rare_slot_rolls: rolls,
                pity_counter_before: pity_counter,
                pity_counter_after,
            }),
        },
        pity_counter_after,
        holo_upgrades: upgrades,
    })
}

/// Reject configs the pool cannot satisfy, before any draw happens.
fn check_capacity(pool: &CardPool, config: &PackConfig) -> Result<()> {
    for slot_type in [SlotType::Rare, SlotType::Uncommon, SlotType::Common] {
        let rarity = slot_type.base_rarity();
        let requested = config.slots_for(slot_type);
        let available = pool.bucket(rarity).len();
        if requested == 0 {
            continue;
        }
        if available == 0 || (!config.allow_duplicates_within_pack && requested > available) {
            return Err(insufficient(pool, rarity, requested));
        }
    }
    Ok(())
}

fn insufficient(pool: &CardPool, rarity: Rarity, requested: usize) -> BinderError {
    BinderError::InsufficientPool {
        set_id: pool.set_id.clone(),
        bucket: rarity.to_string(),
        requested,
        available: pool.bucket(rarity).len(),
    }
}

/// Uniform draws from one bucket.
///
/// With duplicates allowed every draw sees the whole bucket; otherwise each
/// drawn card is removed for the rest of the pack.
struct SheetPicker<'p> {
    remaining: Vec<&'p String>,
    allow_duplicates: bool,
}

impl<'p> SheetPicker<'p> {
    fn new(bucket: &'p [String], allow_duplicates: bool) -> Self {
        Self {
            remaining: bucket.iter().collect(),
            allow_duplicates,
        }
    }

    fn pick(&mut self, rng: &mut PackRng) -> Option<&'p String> {
        if self.remaining.is_empty() {
            return None;
        }
        let idx = rng.index(self.remaining.len());
        if self.allow_duplicates {
            Some(self.remaining[idx])
        } else {
            Some(self.remaining.remove(idx))
        }
    }
}
