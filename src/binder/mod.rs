//! Binder persistence and progression.
//!
//! [`BinderService`] owns the one persisted [`BinderState`]. Mutations are
//! serialized behind a writer lock and applied to a copy of the last
//! committed snapshot; the copy replaces the snapshot only after the store
//! has durably saved it. Readers clone the snapshot `Arc` and never wait on a
//! mutation in progress.

pub mod ledger;
pub mod progression;
pub mod store;

pub use ledger::LedgerOutcome;
pub use progression::ProgressionDelta;
pub use store::{BinderStore, JsonBinderStore, MemoryBinderStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::catalog::{CardCatalog, CardPool};
use crate::clock::Clock;
use crate::config::ProgressionConfig;
use crate::error::{BinderError, Result};
use crate::models::{
    card_key, BinderState, BinderUpdateSummary, GlobalProgress, PackHistoryEntry, PackResult,
    SetProgress,
};

pub struct BinderService {
    catalog: Arc<CardCatalog>,
    store: Box<dyn BinderStore>,
    config: ProgressionConfig,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Arc<BinderState>>,
    writer: Mutex<()>,
}

impl BinderService {
    /// Load the stored binder (or start empty), drop entries the catalog no
    /// longer backs, unlock the first set, and save the result.
    ///
    /// A pool file that exists but cannot be read or parsed fails the open
    /// before anything is saved; only sets with no pool file are dropped.
    pub fn open(
        catalog: Arc<CardCatalog>,
        store: Box<dyn BinderStore>,
        config: ProgressionConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let loaded = store.load()?.unwrap_or_default();
        let mut state = sanitize(loaded, &catalog, &config)?;
        progression::ensure_initial_unlock(&mut state, &config, clock.now());
        store.save(&state)?;

        Ok(Self {
            catalog,
            store,
            config,
            clock,
            snapshot: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        })
    }

    /// The last committed state.
    pub fn snapshot(&self) -> Arc<BinderState> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn catalog(&self) -> &CardCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run `f` against a copy of the committed state and commit the copy.
    ///
    /// Only one mutation runs at a time. If `f` or the save fails, the
    /// snapshot and the stored file are left as they were.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut BinderState) -> Result<T>) -> Result<T> {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut working = (*self.snapshot()).clone();
        let out = f(&mut working)?;
        self.store.save(&working)?;
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(working);
        Ok(out)
    }

    /// Record a pack's cards and re-evaluate progression, as one commit.
    ///
    /// On success every slot of `pack` is marked new or duplicate. On
    /// failure `pack` is left untouched.
    pub fn apply_pack(&self, pack: &mut PackResult) -> Result<BinderUpdateSummary> {
        if pack.set_id.trim().is_empty() {
            return Err(BinderError::InvalidArgument(
                "pack_result.set_id is missing".into(),
            ));
        }
        let pool = self.catalog.load_pool(&pack.set_id)?;
        let mut working_pack = pack.clone();
        let (summary, delta) =
            self.mutate(|state| self.record_pack(state, &pool, &mut working_pack))?;

        *pack = working_pack;
        tracing::info!(
            set_id = %summary.set_id,
            cards_written = summary.cards_written,
            new_discoveries = summary.new_discoveries,
            duplicate_increments = summary.duplicate_increments,
            invalid = summary.invalid_card_ids.len(),
            set_completed = summary.set_completed,
            milestones = ?delta.milestones_reached,
            completed_sets = ?delta.completed_sets,
            newly_unlocked = ?delta.newly_unlocked_sets,
            "Binder updated"
        );
        Ok(summary)
    }

    /// Ledger, progression and history for one pack, applied to a working
    /// state inside [`mutate`](Self::mutate). Returns the caller-facing
    /// summary and the progression transitions the pack caused.
    pub(crate) fn record_pack(
        &self,
        state: &mut BinderState,
        pool: &CardPool,
        pack: &mut PackResult,
    ) -> Result<(BinderUpdateSummary, ProgressionDelta)> {
        let now = self.clock.now();
        let outcome = ledger::apply_pack(state, pool, pack, now);
        let delta = progression::evaluate(state, &self.catalog, &self.config, now)?;

        if self.config.maintain_pack_history {
            state.pack_history.push(PackHistoryEntry {
                timestamp: now,
                set_id: pool.set_id.clone(),
                cards_added: outcome.cards_added.clone(),
                invalid_card_ids: outcome.summary.invalid_card_ids.clone(),
                holo_upgrades: pack.holo_upgrades(),
            });
        }

        let progress = progression::collection_progress(state, &self.catalog, &pool.set_id)?;
        let summary = BinderUpdateSummary {
            set_completed: progress.is_complete,
            newly_unlocked_sets: delta.newly_unlocked_sets.clone(),
            ..outcome.summary
        };
        Ok((summary, delta))
    }

    /// Clear all progress, keeping the schema version, and unlock only the
    /// first set of the progression order.
    pub fn reset(&self) -> Result<BinderState> {
        let state = self.mutate(|state| {
            let version = state.version;
            *state = BinderState {
                version,
                unlocked_sets: self.config.first_set().into_iter().map(String::from).collect(),
                ..BinderState::default()
            };
            Ok(state.clone())
        })?;
        tracing::info!(unlocked_sets = ?state.unlocked_sets, "Binder progress reset");
        Ok(state)
    }

    pub fn collection_progress(&self, set_id: &str) -> Result<SetProgress> {
        let progress = progression::collection_progress(&self.snapshot(), &self.catalog, set_id)?;
        tracing::debug!(
            set_id,
            owned_unique = progress.owned_unique,
            total_available = progress.total_available,
            completion_percentage = progress.completion_percentage,
            "Set progress"
        );
        Ok(progress)
    }

    pub fn global_progress(&self) -> Result<GlobalProgress> {
        progression::global_progress(&self.snapshot(), &self.catalog)
    }

    pub fn unlocked_sets(&self) -> Vec<String> {
        progression::ordered_unlocked_sets(&self.snapshot(), &self.config)
    }

    pub fn is_set_complete(&self, set_id: &str) -> Result<bool> {
        Ok(self.collection_progress(set_id)?.is_complete)
    }

    pub fn is_set_unlocked(&self, set_id: &str) -> bool {
        self.snapshot().is_unlocked(set_id)
    }

    pub fn pity_counter(&self, set_id: &str) -> u32 {
        self.snapshot().pity_counter(set_id)
    }
}

/// Keep only what the catalog still backs.
fn sanitize(
    mut state: BinderState,
    catalog: &CardCatalog,
    config: &ProgressionConfig,
) -> Result<BinderState> {
    let referenced = state
        .cards
        .values()
        .map(|r| r.set_id.as_str())
        .chain(state.unlocked_sets.iter().map(String::as_str))
        .chain(state.set_milestones.keys().map(String::as_str))
        .chain(state.pity_counters.keys().map(String::as_str));

    let mut pools: HashMap<String, Option<Arc<CardPool>>> = HashMap::new();
    for set_id in referenced {
        if pools.contains_key(set_id) {
            continue;
        }
        let pool = match catalog.load_pool(set_id) {
            Ok(pool) => Some(pool),
            Err(BinderError::PoolNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        pools.insert(set_id.to_string(), pool);
    }
    let known = |set_id: &str| matches!(pools.get(set_id), Some(Some(_)));

    state.cards.retain(|key, record| {
        let backed = match pools.get(record.set_id.as_str()) {
            Some(Some(pool)) => pool.contains(&record.card_id),
            _ => false,
        };
        let keep = !record.card_id.is_empty()
            && *key == card_key(&record.set_id, &record.card_id)
            && backed;
        if !keep {
            tracing::warn!(key = %key, "Dropping card record the catalog does not back");
        }
        keep
    });
    state.unlocked_sets.retain(|s| known(s));
    state.set_milestones.retain(|s, _| known(s));
    state.pity_counters.retain(|s, _| known(s));
    if !config.maintain_pack_history {
        state.pack_history.clear();
    }
    Ok(state)
}
