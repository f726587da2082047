use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SCHEMA_VERSION;

/// Key of a card record within [`BinderState::cards`].
pub fn card_key(set_id: &str, card_id: &str) -> String {
    format!("{set_id}::{card_id}")
}

// ---------------------------------------------------------------------------
// CardRecord
// ---------------------------------------------------------------------------

/// Ownership of a single card. Created on first pull, never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub card_id: String,
    pub set_id: String,
    pub quantity_owned: u32,
    pub first_obtained_at: DateTime<Utc>,
    pub last_obtained_at: DateTime<Utc>,
    pub ever_new_discovery: bool,
}

impl CardRecord {
    pub fn discovered(set_id: &str, card_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            card_id: card_id.to_string(),
            set_id: set_id.to_string(),
            quantity_owned: 1,
            first_obtained_at: now,
            last_obtained_at: now,
            ever_new_discovery: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    InitialSetUnlocked,
    NewCardDiscovered,
    SetMilestoneReached,
    SetCompleted,
    NewSetUnlocked,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::InitialSetUnlocked,
        EventType::NewCardDiscovered,
        EventType::SetMilestoneReached,
        EventType::SetCompleted,
        EventType::NewSetUnlocked,
    ];

    /// The serialized name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::InitialSetUnlocked => "INITIAL_SET_UNLOCKED",
            EventType::NewCardDiscovered => "NEW_CARD_DISCOVERED",
            EventType::SetMilestoneReached => "SET_MILESTONE_REACHED",
            EventType::SetCompleted => "SET_COMPLETED",
            EventType::NewSetUnlocked => "NEW_SET_UNLOCKED",
        }
    }
}

/// A notable transition in the binder's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinderEvent {
    pub key: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub set_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<f64>,
}

impl BinderEvent {
    pub fn new(event_type: EventType, set_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            key: String::new(),
            event_type,
            set_id: Some(set_id.to_string()),
            timestamp,
            card_id: None,
            threshold: None,
            next_set_id: None,
            completion_percentage: None,
        }
        .keyed()
    }

    pub fn with_card(mut self, card_id: &str) -> Self {
        self.card_id = Some(card_id.to_string());
        self.keyed()
    }

    pub fn with_threshold(mut self, threshold: u32, completion_percentage: f64) -> Self {
        self.threshold = Some(threshold);
        self.completion_percentage = Some(completion_percentage);
        self.keyed()
    }

    pub fn with_next_set(mut self, next_set_id: &str) -> Self {
        self.next_set_id = Some(next_set_id.to_string());
        self.keyed()
    }

    fn keyed(mut self) -> Self {
        self.key = format!(
            "{}:{}:{}:{}:{}",
            self.event_type.as_str(),
            self.set_id.as_deref().unwrap_or(""),
            self.next_set_id.as_deref().unwrap_or(""),
            self.threshold.map(|t| t.to_string()).unwrap_or_default(),
            self.card_id.as_deref().unwrap_or(""),
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub set_id: String,
    pub cards_added: Vec<String>,
    pub invalid_card_ids: Vec<String>,
    #[serde(default)]
    pub holo_upgrades: usize,
}

// ---------------------------------------------------------------------------
// BinderState
// ---------------------------------------------------------------------------

/// The single persisted aggregate: ownership, progression and audit logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderState {
    pub version: u32,
    pub cards: BTreeMap<String, CardRecord>,
    pub unlocked_sets: Vec<String>,
    pub set_milestones: BTreeMap<String, Vec<u32>>,
    pub events: Vec<BinderEvent>,
    pub pack_history: Vec<PackHistoryEntry>,
    pub pity_counters: BTreeMap<String, u32>,
}

impl Default for BinderState {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            cards: BTreeMap::new(),
            unlocked_sets: Vec::new(),
            set_milestones: BTreeMap::new(),
            events: Vec::new(),
            pack_history: Vec::new(),
            pity_counters: BTreeMap::new(),
        }
    }
}

impl BinderState {
    /// Rebuild a state from a stored JSON document, dropping entries that do
    /// not deserialize instead of rejecting the whole file.
    pub fn from_value_lenient(raw: &Value) -> Self {
        let mut state = Self::default();
        let Some(obj) = raw.as_object() else {
            tracing::error!("Binder root is not an object, starting empty");
            return state;
        };

        if let Some(version) = obj.get("version").and_then(Value::as_u64) {
            state.version = version as u32;
        }

        if let Some(cards) = obj.get("cards").and_then(Value::as_object) {
            for (key, rec) in cards {
                match serde_json::from_value::<CardRecord>(rec.clone()) {
                    Ok(record) => {
                        state.cards.insert(key.clone(), record);
                    }
                    Err(e) => tracing::warn!(key = %key, error = %e, "Dropping malformed card record"),
                }
            }
        }

        if let Some(sets) = obj.get("unlocked_sets").and_then(Value::as_array) {
            for set_id in sets.iter().filter_map(Value::as_str) {
                if !state.unlocked_sets.iter().any(|s| s == set_id) {
                    state.unlocked_sets.push(set_id.to_string());
                }
            }
        }

        if let Some(milestones) = obj.get("set_milestones").and_then(Value::as_object) {
            for (set_id, values) in milestones {
                let Some(values) = values.as_array() else {
                    continue;
                };
                let mut thresholds: Vec<u32> = values
                    .iter()
                    .filter_map(Value::as_u64)
                    .filter(|v| (1..=100).contains(v))
                    .map(|v| v as u32)
                    .collect();
                thresholds.sort_unstable();
                thresholds.dedup();
                state.set_milestones.insert(set_id.clone(), thresholds);
            }
        }

        state.events = lenient_list(obj.get("events"), "event");
        state.pack_history = lenient_list(obj.get("pack_history"), "pack history entry");

        if let Some(counters) = obj.get("pity_counters").and_then(Value::as_object) {
            for (set_id, count) in counters {
                if let Some(count) = count.as_u64() {
                    state.pity_counters.insert(set_id.clone(), count as u32);
                }
            }
        }

        state
    }

    pub fn record(&self, set_id: &str, card_id: &str) -> Option<&CardRecord> {
        self.cards.get(&card_key(set_id, card_id))
    }

    pub fn is_unlocked(&self, set_id: &str) -> bool {
        self.unlocked_sets.iter().any(|s| s == set_id)
    }

    /// Append an event unless one with the same key was already logged.
    /// Returns whether it was appended.
    pub fn push_event(&mut self, event: BinderEvent) -> bool {
        if self.events.iter().any(|e| e.key == event.key) {
            return false;
        }
        tracing::info!(
            event = event.event_type.as_str(),
            set_id = event.set_id.as_deref().unwrap_or(""),
            key = %event.key,
            "Binder event"
        );
        self.events.push(event);
        true
    }

    pub fn pity_counter(&self, set_id: &str) -> u32 {
        self.pity_counters.get(set_id).copied().unwrap_or(0)
    }
}

fn lenient_list<T: serde::de::DeserializeOwned>(value: Option<&Value>, what: &str) -> Vec<T> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed {what}");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// BinderUpdateSummary
// ---------------------------------------------------------------------------

/// Outcome of applying one pack to the binder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinderUpdateSummary {
    pub set_id: String,
    pub total_slots_processed: usize,
    pub cards_written: usize,
    pub new_discoveries: usize,
    pub duplicate_increments: usize,
    pub invalid_card_ids: Vec<String>,
    pub set_completed: bool,
    pub newly_unlocked_sets: Vec<String>,
}
