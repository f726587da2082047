use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema tag written into every binder file.
pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_PROGRESSION_ORDER: [&str; 6] =
    ["base2", "jungle", "fossil", "base3", "base4", "base5"];
pub const DEFAULT_MILESTONE_THRESHOLDS: [u32; 4] = [25, 50, 75, 100];
pub const DEFAULT_UNLOCK_THRESHOLD: u32 = 100;

pub const DEFAULT_PROGRESSION_FILE: &str = "config/progression.json";

pub fn default_pools_dir() -> PathBuf {
    PathBuf::from("pools")
}

pub fn default_binder_file() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        data.join("booster-binder").join("binder_state.json")
    } else {
        PathBuf::from("data").join("binder_state.json")
    }
}

// ---------------------------------------------------------------------------
// ProgressionConfig
// ---------------------------------------------------------------------------

/// Rules governing set unlocks, milestones and the optional pack history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Unlock sequence. The first entry is unlocked unconditionally.
    pub progression_order: Vec<String>,
    /// Emit events for thresholds below full completion, and let the
    /// predecessor's recorded milestones satisfy the unlock bound.
    pub track_partial_milestones: bool,
    /// Completion percentages in `1..=100`, ascending.
    pub milestone_thresholds: Vec<u32>,
    pub maintain_pack_history: bool,
    /// Completion percentage a predecessor must reach when partial
    /// milestones are tracked.
    pub unlock_threshold: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            progression_order: DEFAULT_PROGRESSION_ORDER
                .iter()
                .map(|s| s.to_string())
                .collect(),
            track_partial_milestones: true,
            milestone_thresholds: DEFAULT_MILESTONE_THRESHOLDS.to_vec(),
            maintain_pack_history: false,
            unlock_threshold: DEFAULT_UNLOCK_THRESHOLD,
        }
    }
}

impl ProgressionConfig {
    /// Load a progression config file, falling back to defaults.
    ///
    /// A missing file yields the defaults. A file that cannot be parsed, or
    /// a field with an invalid value, is logged and replaced by the default
    /// for that field; loading never fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }

        let raw = match fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<Value>(&s).map_err(|e| e.to_string()))
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable progression config, using defaults");
                return Self::default();
            }
        };

        Self::from_value(&raw)
    }

    /// Build a config from a JSON object, field by field.
    pub fn from_value(raw: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = raw.as_object() else {
            tracing::warn!("Progression config must be an object, using defaults");
            return defaults;
        };

        let progression_order = match obj.get("progression_order") {
            None => defaults.progression_order,
            Some(Value::Array(items))
                if items
                    .iter()
                    .all(|v| v.as_str().is_some_and(|s| !s.trim().is_empty())) =>
            {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .collect()
            }
            Some(other) => {
                tracing::warn!(value = %other, "Invalid progression_order, using default");
                defaults.progression_order
            }
        };

        let track_partial_milestones =
            bool_field(obj, "track_partial_milestones", defaults.track_partial_milestones);
        let maintain_pack_history =
            bool_field(obj, "maintain_pack_history", defaults.maintain_pack_history);

        let milestone_thresholds = match obj.get("milestone_thresholds") {
            None => defaults.milestone_thresholds,
            Some(Value::Array(items)) if items.iter().all(|v| percentage(v).is_some()) => {
                let mut values: Vec<u32> = items.iter().filter_map(percentage).collect();
                values.sort_unstable();
                values.dedup();
                values
            }
            Some(other) => {
                tracing::warn!(value = %other, "Invalid milestone_thresholds, using default");
                defaults.milestone_thresholds
            }
        };

        let unlock_threshold = match obj.get("unlock_threshold") {
            None => defaults.unlock_threshold,
            Some(v) => percentage(v).unwrap_or_else(|| {
                tracing::warn!(value = %v, "Invalid unlock_threshold, using default");
                defaults.unlock_threshold
            }),
        };

        Self {
            progression_order,
            track_partial_milestones,
            milestone_thresholds,
            maintain_pack_history,
            unlock_threshold,
        }
    }

    /// The set unlocked at initialization, if any.
    pub fn first_set(&self) -> Option<&str> {
        self.progression_order.first().map(String::as_str)
    }
}

fn bool_field(obj: &serde_json::Map<String, Value>, key: &str, default: bool) -> bool {
    match obj.get(key) {
        None => default,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            tracing::warn!(field = key, value = %other, "Expected a boolean, using default");
            default
        }
    }
}

fn percentage(v: &Value) -> Option<u32> {
    v.as_u64()
        .filter(|n| (1..=100).contains(n))
        .map(|n| n as u32)
}
