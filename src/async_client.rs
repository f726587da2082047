//! Async wrapper around [`BinderSdk`] for use in async runtimes (Tokio, etc.).
//!
//! Runs all SDK operations on a blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free while
//! binder files are read and written.
//!
//! # Example
//!
//! ```no_run
//! use booster_binder::{AsyncBinderSdk, BinderSdk, PackConfig, PackOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let sdk = AsyncBinderSdk::build(BinderSdk::builder().pools_dir("pools"))
//!         .await
//!         .unwrap();
//!
//!     let (pack, summary) = sdk
//!         .open_and_add("base2", PackConfig::default(), PackOptions::default())
//!         .await
//!         .unwrap();
//!
//!     // Run any sync SDK method via closure
//!     let unlocked = sdk.run(|s| Ok(s.get_unlocked_sets())).await.unwrap();
//! }
//! ```

use std::sync::Arc;

use crate::error::{BinderError, Result};
use crate::models::{BinderUpdateSummary, GlobalProgress, PackConfig, PackOptions, PackResult, SetProgress};
use crate::{BinderSdk, BinderSdkBuilder};

/// Async wrapper around [`BinderSdk`].
///
/// The SDK synchronizes its own mutations, so the handle is a plain shared
/// [`Arc`] and clones of it can be used from any task.
#[derive(Clone)]
pub struct AsyncBinderSdk {
    inner: Arc<BinderSdk>,
}

impl AsyncBinderSdk {
    /// Build the SDK on the blocking thread pool, since building reads the
    /// stored binder.
    pub async fn build(builder: BinderSdkBuilder) -> Result<Self> {
        tokio::task::spawn_blocking(move || {
            let sdk = builder.build()?;
            Ok(Self::new(sdk))
        })
        .await
        .map_err(|e| BinderError::InvalidArgument(format!("Task join error: {e}")))?
    }

    /// Wrap an already built SDK.
    pub fn new(sdk: BinderSdk) -> Self {
        Self {
            inner: Arc::new(sdk),
        }
    }

    /// Run a sync SDK operation on the blocking thread pool.
    ///
    /// ```no_run
    /// # use booster_binder::{AsyncBinderSdk, BinderSdk};
    /// # async fn example() -> booster_binder::Result<()> {
    /// # let sdk = AsyncBinderSdk::build(BinderSdk::builder()).await?;
    /// let complete = sdk.run(|s| s.is_set_complete("base2")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&BinderSdk) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sdk = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&sdk))
            .await
            .map_err(|e| BinderError::InvalidArgument(format!("Task join error: {e}")))?
    }

    pub async fn open_pack(
        &self,
        set_id: &str,
        config: PackConfig,
        options: PackOptions,
    ) -> Result<PackResult> {
        let set_id = set_id.to_string();
        self.run(move |s| s.open_pack(&set_id, &config, options)).await
    }

    /// Record a pack, returning the flagged pack alongside the summary.
    pub async fn add_cards_to_binder(
        &self,
        mut pack: PackResult,
    ) -> Result<(PackResult, BinderUpdateSummary)> {
        self.run(move |s| {
            let summary = s.add_cards_to_binder(&mut pack)?;
            Ok((pack, summary))
        })
        .await
    }

    pub async fn open_and_add(
        &self,
        set_id: &str,
        config: PackConfig,
        options: PackOptions,
    ) -> Result<(PackResult, BinderUpdateSummary)> {
        let set_id = set_id.to_string();
        self.run(move |s| s.open_and_add(&set_id, &config, options))
            .await
    }

    pub async fn get_collection_progress(&self, set_id: &str) -> Result<SetProgress> {
        let set_id = set_id.to_string();
        self.run(move |s| s.get_collection_progress(&set_id)).await
    }

    pub async fn get_global_progress(&self) -> Result<GlobalProgress> {
        self.run(|s| s.get_global_progress()).await
    }

    /// Access the wrapped SDK for calls that need no blocking pool.
    pub fn sdk(&self) -> &BinderSdk {
        &self.inner
    }
}
