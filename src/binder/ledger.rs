//! Applies drawn packs to ownership records.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::catalog::CardPool;
use crate::models::{
    card_key, BinderEvent, BinderState, BinderUpdateSummary, CardRecord, EventType, PackResult,
};

/// Result of applying one pack to a working copy of the state.
#[derive(Debug, Clone, Default)]
pub struct LedgerOutcome {
    /// Counters and skipped ids. `set_completed` and `newly_unlocked_sets`
    /// are left for the progression pass.
    pub summary: BinderUpdateSummary,
    /// Card ids written, in slot order.
    pub cards_added: Vec<String>,
}

/// Record every valid slot of `pack` in `state` and mark each slot new or
/// duplicate.
///
/// Slots whose card id is empty or not in `pool` are skipped and listed in
/// `invalid_card_ids`; they never abort the pack.
pub fn apply_pack(
    state: &mut BinderState,
    pool: &CardPool,
    pack: &mut PackResult,
    now: DateTime<Utc>,
) -> LedgerOutcome {
    let set_id = pool.set_id.clone();
    let mut outcome = LedgerOutcome {
        summary: BinderUpdateSummary {
            set_id: set_id.clone(),
            total_slots_processed: pack.slots.len(),
            ..Default::default()
        },
        cards_added: Vec::with_capacity(pack.slots.len()),
    };

    for slot in pack.slots.iter_mut() {
        slot.is_new = false;
        slot.is_duplicate = false;

        let card_id = slot.card_id.trim();
        if card_id.is_empty() {
            tracing::warn!(slot = slot.slot_index, "Skipping slot without a card id");
            outcome.summary.invalid_card_ids.push(slot.card_id.clone());
            continue;
        }
        if !pool.contains(card_id) {
            tracing::warn!(
                slot = slot.slot_index,
                card_id,
                set_id = %set_id,
                "Skipping card id not present in the pack's set"
            );
            outcome.summary.invalid_card_ids.push(card_id.to_string());
            continue;
        }

        match state.cards.get_mut(&card_key(&set_id, card_id)) {
            Some(record) => {
                record.quantity_owned = record.quantity_owned.saturating_add(1);
                record.last_obtained_at = now;
                slot.is_duplicate = true;
                outcome.summary.duplicate_increments += 1;
                tracing::info!(card_id, quantity_owned = record.quantity_owned, "Duplicate card recorded");
            }
            None => {
                state.cards.insert(
                    card_key(&set_id, card_id),
                    CardRecord::discovered(&set_id, card_id, now),
                );
                state.push_event(
                    BinderEvent::new(EventType::NewCardDiscovered, &set_id, now).with_card(card_id),
                );
                slot.is_new = true;
                outcome.summary.new_discoveries += 1;
                tracing::info!(card_id, set_id = %set_id, "New card recorded");
            }
        }
        outcome.cards_added.push(card_id.to_string());
    }

    outcome.summary.cards_written = outcome.cards_added.len();
    pack.refresh_summary();
    outcome
}

/// Mark slots new or duplicate against `state` without changing it.
///
/// A card repeated within the pack counts as new only on its first
/// occurrence, matching what [`apply_pack`] will record.
pub fn preview_ownership(state: &BinderState, pack: &mut PackResult) {
    preview_packs(state, std::slice::from_mut(pack));
}

/// Like [`preview_ownership`], treating `packs` as if applied in order.
pub fn preview_packs(state: &BinderState, packs: &mut [PackResult]) {
    let mut seen: HashSet<String> = HashSet::new();
    for pack in packs.iter_mut() {
        let set_id = pack.set_id.clone();
        for slot in pack.slots.iter_mut() {
            let owned = state
                .record(&set_id, &slot.card_id)
                .is_some_and(|r| r.quantity_owned > 0);
            let first_seen = seen.insert(card_key(&set_id, &slot.card_id));
            slot.is_new = !owned && first_seen;
            slot.is_duplicate = !slot.is_new;
        }
        pack.refresh_summary();
    }
}
