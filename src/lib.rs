//! Booster pack simulator with a durable collection binder.
//!
//! Opens randomized packs from per-set rarity pools, records every pulled
//! card in a persistent binder, and tracks per-set completion, milestones and
//! set unlocks along a configured progression order.
//!
//! # Quick start
//!
//! ```no_run
//! use booster_binder::{BinderSdk, PackConfig, PackOptions};
//!
//! let sdk = BinderSdk::builder().pools_dir("pools").build().unwrap();
//!
//! // Open a pack and record it
//! let mut pack = sdk
//!     .open_pack("base2", &PackConfig::default(), PackOptions::default())
//!     .unwrap();
//! let summary = sdk.add_cards_to_binder(&mut pack).unwrap();
//!
//! // Check how far along the set is
//! let progress = sdk.get_collection_progress("base2").unwrap();
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod binder;
pub mod booster;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod pool_builder;
pub mod rng;

#[cfg(feature = "async")]
pub use async_client::AsyncBinderSdk;
pub use binder::{BinderService, BinderStore, JsonBinderStore, MemoryBinderStore};
pub use booster::PackSimulator;
pub use catalog::{CardCatalog, CardPool, CatalogCard};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ProgressionConfig;
pub use error::{BinderError, Result};
pub use models::*;
pub use rng::PackRng;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// BinderSdkBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`BinderSdk`] instance.
///
/// Use [`BinderSdk::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](BinderSdkBuilder::build) to create the SDK.
#[derive(Default)]
pub struct BinderSdkBuilder {
    pools_dir: Option<PathBuf>,
    pools: Option<Vec<CardPool>>,
    binder_file: Option<PathBuf>,
    store: Option<Box<dyn BinderStore>>,
    progression: Option<ProgressionConfig>,
    progression_file: Option<PathBuf>,
    clock: Option<Arc<dyn Clock>>,
}

impl BinderSdkBuilder {
    /// Read pools from this directory.
    ///
    /// Defaults to `./pools`. Ignored when [`pools`](Self::pools) is set.
    pub fn pools_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pools_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Serve pools from memory instead of a directory.
    pub fn pools<I: IntoIterator<Item = CardPool>>(mut self, pools: I) -> Self {
        self.pools = Some(pools.into_iter().collect());
        self
    }

    /// Persist the binder to this JSON file.
    ///
    /// If not set, the platform data directory is used (e.g.
    /// `~/.local/share/booster-binder/binder_state.json` on Linux).
    pub fn binder_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.binder_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a custom store. Takes precedence over [`binder_file`](Self::binder_file).
    pub fn store<S: BinderStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn progression(mut self, config: ProgressionConfig) -> Self {
        self.progression = Some(config);
        self
    }

    /// Load the progression config from a JSON file.
    ///
    /// Missing or invalid values fall back to the defaults. Ignored when
    /// [`progression`](Self::progression) is set.
    pub fn progression_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.progression_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Time source for binder timestamps. Defaults to [`SystemClock`].
    pub fn clock<C: Clock + 'static>(mut self, clock: Arc<C>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the SDK, loading (and sanitizing) the stored binder.
    ///
    /// Pools are not read eagerly beyond what sanitizing the stored binder
    /// needs; they are loaded on first use.
    pub fn build(self) -> Result<BinderSdk> {
        let catalog = match self.pools {
            Some(pools) => CardCatalog::from_pools(pools),
            None => CardCatalog::open(self.pools_dir.unwrap_or_else(config::default_pools_dir))?,
        };

        let progression = match (self.progression, self.progression_file) {
            (Some(config), _) => config,
            (None, Some(path)) => ProgressionConfig::load(path),
            (None, None) => ProgressionConfig::load(config::DEFAULT_PROGRESSION_FILE),
        };

        let store: Box<dyn BinderStore> = match self.store {
            Some(store) => store,
            None => Box::new(JsonBinderStore::new(
                self.binder_file.unwrap_or_else(config::default_binder_file),
            )),
        };

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let service = BinderService::open(Arc::new(catalog), store, progression, clock)?;
        Ok(BinderSdk { service })
    }
}

// ---------------------------------------------------------------------------
// BinderSdk
// ---------------------------------------------------------------------------

/// The main entry point: pack opening, binder updates and progress queries.
///
/// All methods take `&self`; binder mutations are serialized internally and
/// reads see the last committed state. Created via [`BinderSdk::builder()`].
pub struct BinderSdk {
    service: BinderService,
}

impl BinderSdk {
    /// Create a new builder for configuring the SDK.
    pub fn builder() -> BinderSdkBuilder {
        BinderSdkBuilder::default()
    }

    // -- Packs -------------------------------------------------------------

    /// Open one pack of `set_id`.
    ///
    /// The set's pity counter is advanced and persisted. Slots are flagged
    /// new or duplicate as a preview against the current binder; nothing is
    /// recorded until [`add_cards_to_binder`](Self::add_cards_to_binder).
    pub fn open_pack(
        &self,
        set_id: &str,
        config: &PackConfig,
        options: PackOptions,
    ) -> Result<PackResult> {
        let simulator = PackSimulator::new(self.service.catalog());
        let mut rng = PackRng::new(options.seed);

        let mut pack = self.service.mutate(|state| {
            let composed = simulator.open_pack(
                set_id,
                config,
                state.pity_counter(set_id),
                &mut rng,
                options.debug,
            )?;
            state
                .pity_counters
                .insert(composed.pack.set_id.clone(), composed.pity_counter_after);
            Ok(composed.pack)
        })?;

        binder::ledger::preview_ownership(&self.service.snapshot(), &mut pack);
        Ok(pack)
    }

    /// Open `packs` packs of `set_id` in a row.
    ///
    /// With a seed, pack `i` uses `seed + i`. The pity counter carries across
    /// the box and is persisted once at the end. Previews treat the box as a
    /// whole, so a card is new only in the first pack that shows it.
    pub fn open_box(
        &self,
        set_id: &str,
        config: &PackConfig,
        packs: usize,
        options: PackOptions,
    ) -> Result<Vec<PackResult>> {
        let simulator = PackSimulator::new(self.service.catalog());

        let mut opened = self.service.mutate(|state| {
            let composed = simulator.open_box(
                set_id,
                config,
                packs,
                state.pity_counter(set_id),
                options.seed,
                options.debug,
            )?;
            if let Some(last) = composed.last() {
                state
                    .pity_counters
                    .insert(last.pack.set_id.clone(), last.pity_counter_after);
            }
            Ok(composed.into_iter().map(|c| c.pack).collect::<Vec<_>>())
        })?;

        binder::ledger::preview_packs(&self.service.snapshot(), &mut opened);
        Ok(opened)
    }

    /// Record a pack in the binder and re-evaluate progression.
    ///
    /// Card ids that are empty or not part of the pack's set are skipped and
    /// reported in the summary. The whole update commits atomically; on
    /// error neither the binder nor `pack` changes.
    pub fn add_cards_to_binder(&self, pack: &mut PackResult) -> Result<BinderUpdateSummary> {
        self.service.apply_pack(pack)
    }

    /// Open a pack and record it in one commit.
    pub fn open_and_add(
        &self,
        set_id: &str,
        config: &PackConfig,
        options: PackOptions,
    ) -> Result<(PackResult, BinderUpdateSummary)> {
        let simulator = PackSimulator::new(self.service.catalog());
        let mut rng = PackRng::new(options.seed);

        let (pack, summary, delta) = self.service.mutate(|state| {
            let composed = simulator.open_pack(
                set_id,
                config,
                state.pity_counter(set_id),
                &mut rng,
                options.debug,
            )?;
            let mut pack = composed.pack;
            state
                .pity_counters
                .insert(pack.set_id.clone(), composed.pity_counter_after);
            let pool = self.service.catalog().load_pool(&pack.set_id)?;
            let (summary, delta) = self.service.record_pack(state, &pool, &mut pack)?;
            Ok((pack, summary, delta))
        })?;

        tracing::info!(
            set_id = %summary.set_id,
            new_discoveries = summary.new_discoveries,
            duplicate_increments = summary.duplicate_increments,
            milestones = ?delta.milestones_reached,
            completed_sets = ?delta.completed_sets,
            newly_unlocked = ?delta.newly_unlocked_sets,
            "Pack opened into binder"
        );
        Ok((pack, summary))
    }

    // -- Progress ----------------------------------------------------------

    pub fn get_collection_progress(&self, set_id: &str) -> Result<SetProgress> {
        self.service.collection_progress(set_id)
    }

    /// Progress over every set with pool data, locked sets included.
    pub fn get_global_progress(&self) -> Result<GlobalProgress> {
        self.service.global_progress()
    }

    /// Unlocked sets, in progression order first.
    pub fn get_unlocked_sets(&self) -> Vec<String> {
        self.service.unlocked_sets()
    }

    pub fn is_set_complete(&self, set_id: &str) -> Result<bool> {
        self.service.is_set_complete(set_id)
    }

    pub fn is_set_unlocked(&self, set_id: &str) -> bool {
        self.service.is_set_unlocked(set_id)
    }

    /// Consecutive packs of `set_id` opened without a holo.
    pub fn pity_counter(&self, set_id: &str) -> u32 {
        self.service.pity_counter(set_id)
    }

    // -- Binder and catalog ------------------------------------------------

    /// The last committed binder state.
    pub fn get_binder_state(&self) -> Arc<BinderState> {
        self.service.snapshot()
    }

    /// Clear all progress and unlock only the first set again.
    pub fn reset_progress(&self) -> Result<BinderState> {
        self.service.reset()
    }

    /// Every card of a set with its rarity.
    pub fn set_catalog(&self, set_id: &str) -> Result<Vec<CatalogCard>> {
        self.service.catalog().set_catalog(set_id)
    }

    /// Every set with pool data, sorted.
    pub fn set_ids(&self) -> Result<Vec<String>> {
        self.service.catalog().set_ids()
    }

    pub fn progression(&self) -> &ProgressionConfig {
        self.service.config()
    }

    /// Return a reference to the underlying [`BinderService`] for advanced usage.
    pub fn service(&self) -> &BinderService {
        &self.service
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for BinderSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.service.snapshot();
        let pools = self
            .service
            .catalog()
            .pools_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        write!(
            f,
            "BinderSdk(pools_dir={}, cards={}, unlocked=[{}])",
            pools,
            state.cards.len(),
            state.unlocked_sets.join(", ")
        )
    }
}
