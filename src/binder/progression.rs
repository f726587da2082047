//! Completion metrics, milestones and set unlocks.
//!
//! Everything here is derived from `BinderState::cards` and the catalog, so
//! re-running [`evaluate`] on unchanged data changes nothing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::catalog::CardCatalog;
use crate::config::ProgressionConfig;
use crate::error::{BinderError, Result};
use crate::models::{
    completion_percentage, BinderEvent, BinderState, EventType, GlobalProgress, SetProgress,
};

/// What one evaluation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressionDelta {
    pub milestones_reached: Vec<(String, u32)>,
    pub completed_sets: Vec<String>,
    pub newly_unlocked_sets: Vec<String>,
}

/// Cards of `set_id` owned at least once.
pub fn owned_unique(state: &BinderState, set_id: &str) -> usize {
    state
        .cards
        .values()
        .filter(|r| r.set_id == set_id && r.quantity_owned > 0)
        .count()
}

pub fn collection_progress(
    state: &BinderState,
    catalog: &CardCatalog,
    set_id: &str,
) -> Result<SetProgress> {
    let total_available = catalog.total_available(set_id)?;
    Ok(progress_of(set_id, owned_unique(state, set_id), total_available))
}

/// Progress summed over every set with pool data, locked or not.
pub fn global_progress(state: &BinderState, catalog: &CardCatalog) -> Result<GlobalProgress> {
    let mut per_set = BTreeMap::new();
    let mut owned = 0;
    let mut total = 0;
    for set_id in catalog.set_ids()? {
        let report = collection_progress(state, catalog, &set_id)?;
        owned += report.owned_unique;
        total += report.total_available;
        per_set.insert(set_id, report);
    }
    Ok(GlobalProgress {
        owned_unique: owned,
        total_available: total,
        completion_percentage: completion_percentage(owned, total),
        remaining: total.saturating_sub(owned),
        per_set,
    })
}

fn progress_of(set_id: &str, owned: usize, total: usize) -> SetProgress {
    let remaining = total.saturating_sub(owned);
    SetProgress {
        set_id: set_id.to_string(),
        owned_unique: owned,
        total_available: total,
        completion_percentage: completion_percentage(owned, total),
        remaining,
        is_complete: remaining == 0 && total > 0,
    }
}

/// Exact threshold test; rounding never crosses a threshold early.
fn crossed(owned: usize, total: usize, threshold: u32) -> bool {
    total > 0 && (owned as u64) * 100 >= u64::from(threshold) * total as u64
}

/// Unlock the first set of the progression order if it is not yet.
pub fn ensure_initial_unlock(
    state: &mut BinderState,
    config: &ProgressionConfig,
    now: DateTime<Utc>,
) -> Option<String> {
    let first = config.first_set()?;
    if state.is_unlocked(first) {
        return None;
    }
    state.unlocked_sets.push(first.to_string());
    state.push_event(BinderEvent::new(EventType::InitialSetUnlocked, first, now));
    tracing::info!(set_id = first, "Initial set unlocked");
    Some(first.to_string())
}

/// Record milestones and completions, then unlock sets in progression
/// order.
pub fn evaluate(
    state: &mut BinderState,
    catalog: &CardCatalog,
    config: &ProgressionConfig,
    now: DateTime<Utc>,
) -> Result<ProgressionDelta> {
    let mut delta = ProgressionDelta::default();

    let sets_with_cards: BTreeSet<String> =
        state.cards.values().map(|r| r.set_id.clone()).collect();

    for set_id in &sets_with_cards {
        let total = catalog.total_available(set_id)?;
        let owned = owned_unique(state, set_id);
        let percentage = completion_percentage(owned, total);

        let recorded = state.set_milestones.get(set_id).cloned().unwrap_or_default();
        let newly: Vec<u32> = config
            .milestone_thresholds
            .iter()
            .copied()
            .filter(|&t| crossed(owned, total, t) && !recorded.contains(&t))
            .collect();

        if !newly.is_empty() {
            let mut updated = recorded;
            updated.extend(newly.iter().copied());
            updated.sort_unstable();
            updated.dedup();
            state.set_milestones.insert(set_id.clone(), updated);

            for &threshold in &newly {
                tracing::info!(set_id = %set_id, threshold, percentage, "Milestone crossed");
                if config.track_partial_milestones && threshold < 100 {
                    state.push_event(
                        BinderEvent::new(EventType::SetMilestoneReached, set_id, now)
                            .with_threshold(threshold, percentage),
                    );
                }
                delta.milestones_reached.push((set_id.clone(), threshold));
            }
        }

        if total > 0 && owned >= total
            && state.push_event(BinderEvent::new(EventType::SetCompleted, set_id, now))
        {
            delta.completed_sets.push(set_id.clone());
        }
    }

    for pair in config.progression_order.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if state.is_unlocked(next) || !state.is_unlocked(previous) {
            continue;
        }
        if !meets_unlock_bound(state, catalog, config, previous)? {
            continue;
        }
        state.unlocked_sets.push(next.clone());
        state.push_event(
            BinderEvent::new(EventType::NewSetUnlocked, previous, now).with_next_set(next),
        );
        tracing::info!(current_set = %previous, next_set = %next, "Progression unlocked");
        delta.newly_unlocked_sets.push(next.clone());
    }

    Ok(delta)
}

/// Whether `set_id` has progressed far enough to unlock its successor.
///
/// Full completion, or, with partial milestones tracked, a recorded
/// threshold at or above `unlock_threshold`. When no configured threshold
/// reaches `unlock_threshold`, full completion is required.
fn meets_unlock_bound(
    state: &BinderState,
    catalog: &CardCatalog,
    config: &ProgressionConfig,
    set_id: &str,
) -> Result<bool> {
    let total = match catalog.total_available(set_id) {
        Ok(total) => total,
        Err(BinderError::PoolNotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };
    let owned = owned_unique(state, set_id);
    if total > 0 && owned >= total {
        return Ok(true);
    }

    if config.track_partial_milestones {
        let bound = config
            .milestone_thresholds
            .iter()
            .copied()
            .find(|&t| t >= config.unlock_threshold);
        if let Some(bound) = bound {
            return Ok(state
                .set_milestones
                .get(set_id)
                .is_some_and(|recorded| recorded.iter().any(|&t| t >= bound)));
        }
    }
    Ok(false)
}

/// Unlocked sets in progression order, followed by any others sorted.
pub fn ordered_unlocked_sets(state: &BinderState, config: &ProgressionConfig) -> Vec<String> {
    let mut ordered: Vec<String> = config
        .progression_order
        .iter()
        .filter(|s| state.is_unlocked(s))
        .cloned()
        .collect();
    let mut extras: Vec<String> = state
        .unlocked_sets
        .iter()
        .filter(|s| !config.progression_order.contains(s))
        .cloned()
        .collect();
    extras.sort();
    extras.dedup();
    ordered.append(&mut extras);
    ordered
}
