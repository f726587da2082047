use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BinderError, Result};

// ---------------------------------------------------------------------------
// Rarity / SlotType
// ---------------------------------------------------------------------------

/// Rarity bucket a card belongs to within its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Holo,
}

impl Rarity {
    /// All buckets, in the order pool files list them.
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Uncommon, Rarity::Rare, Rarity::Holo];

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Holo => "holo",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rarity tier a pack position is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Rare,
    Uncommon,
    Common,
}

impl SlotType {
    /// Bucket drawn from before any holo upgrade.
    pub fn base_rarity(self) -> Rarity {
        match self {
            SlotType::Rare => Rarity::Rare,
            SlotType::Uncommon => Rarity::Uncommon,
            SlotType::Common => Rarity::Common,
        }
    }
}

// ---------------------------------------------------------------------------
// PackConfig
// ---------------------------------------------------------------------------

/// Pack structure and pull probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    pub rare_slots: u32,
    pub uncommon_slots: u32,
    pub common_slots: u32,
    /// Probability in `[0, 1]`, rolled independently per rare slot.
    pub holo_upgrade_chance: f64,
    pub allow_duplicates_within_pack: bool,
    /// Consecutive packs without a holo after which the next pack's first
    /// rare slot is forced to holo.
    pub pity_after_packs: Option<u32>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            rare_slots: 1,
            uncommon_slots: 3,
            common_slots: 6,
            holo_upgrade_chance: 1.0 / 3.0,
            allow_duplicates_within_pack: true,
            pity_after_packs: None,
        }
    }
}

impl PackConfig {
    /// Parse a config from caller-supplied JSON.
    ///
    /// Missing fields take their defaults. Unknown fields, negative slot
    /// counts and wrongly typed values are rejected as
    /// [`BinderError::InvalidConfig`]. The result is validated.
    pub fn from_value(value: &Value) -> Result<Self> {
        let config: PackConfig = serde_json::from_value(value.clone())
            .map_err(|e| BinderError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.holo_upgrade_chance) {
            return Err(BinderError::InvalidConfig(format!(
                "holo_upgrade_chance must be between 0.0 and 1.0, got {}",
                self.holo_upgrade_chance
            )));
        }
        if self.pity_after_packs == Some(0) {
            return Err(BinderError::InvalidConfig(
                "pity_after_packs must be positive when provided".into(),
            ));
        }
        if self.total_slots() == 0 {
            return Err(BinderError::InvalidConfig(
                "pack must contain at least one slot".into(),
            ));
        }
        Ok(())
    }

    pub fn total_slots(&self) -> usize {
        self.rare_slots as usize + self.uncommon_slots as usize + self.common_slots as usize
    }

    /// Configured slot count for a tier.
    pub fn slots_for(&self, slot_type: SlotType) -> usize {
        match slot_type {
            SlotType::Rare => self.rare_slots as usize,
            SlotType::Uncommon => self.uncommon_slots as usize,
            SlotType::Common => self.common_slots as usize,
        }
    }
}

// ---------------------------------------------------------------------------
// PackOptions
// ---------------------------------------------------------------------------

/// Per-call options for opening packs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackOptions {
    /// Seed for a reproducible draw. Entropy-seeded when `None`.
    pub seed: Option<u64>,
    /// Attach per-rare-slot roll details to the result.
    pub debug: bool,
}

impl PackOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            debug: false,
        }
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

// ---------------------------------------------------------------------------
// PackResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackSlot {
    pub slot_index: u32,
    pub slot_type: SlotType,
    pub rarity: Rarity,
    pub card_id: String,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_duplicate: bool,
}

impl PackSlot {
    /// True when a rare slot was upgraded to holo.
    pub fn is_upgraded(&self) -> bool {
        self.rarity != self.slot_type.base_rarity()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSummary {
    pub total_cards: usize,
    pub new_cards: usize,
    pub duplicate_cards: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RareSlotRoll {
    pub rare_slot_index: u32,
    /// Absent when the pity counter forced the upgrade.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub roll: Option<f64>,
    pub threshold: f64,
    pub upgraded_to_holo: bool,
    #[serde(default)]
    pub pity_forced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackDebug {
    pub rare_slot_rolls: Vec<RareSlotRoll>,
    pub pity_counter_before: u32,
    pub pity_counter_after: u32,
}

/// A drawn pack, ready to be shown to the player and applied to the binder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackResult {
    pub set_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub config: PackConfig,
    pub slots: Vec<PackSlot>,
    #[serde(default)]
    pub summary: PackSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<PackDebug>,
}

impl PackResult {
    /// Number of slots upgraded to holo.
    pub fn holo_upgrades(&self) -> usize {
        self.slots.iter().filter(|s| s.is_upgraded()).count()
    }

    /// Recompute `summary` from the slot flags.
    pub fn refresh_summary(&mut self) {
        self.summary = PackSummary {
            total_cards: self.slots.len(),
            new_cards: self.slots.iter().filter(|s| s.is_new).count(),
            duplicate_cards: self.slots.iter().filter(|s| s.is_duplicate).count(),
        };
    }
}
