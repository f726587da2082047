//! Durable storage for the binder aggregate.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{BinderError, Result};
use crate::models::BinderState;

/// Persistence port for [`BinderState`].
///
/// `save` must be all-or-nothing: after a failed save, `load` returns the
/// previously saved state.
pub trait BinderStore: Send + Sync {
    /// Load the last saved state, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<BinderState>>;

    fn save(&self, state: &BinderState) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JsonBinderStore
// ---------------------------------------------------------------------------

/// One pretty-printed JSON document on disk, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonBinderStore {
    path: PathBuf,
}

impl JsonBinderStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move an unparsable binder file aside so it is never overwritten.
    fn quarantine(&self) -> io::Result<PathBuf> {
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("binder_state.json");
        let target = self.path.with_file_name(format!(
            "{}.corrupt-{}",
            file_name,
            chrono::Utc::now().timestamp()
        ));
        fs::rename(&self.path, &target)?;
        Ok(target)
    }
}

impl BinderStore for JsonBinderStore {
    fn load(&self) -> Result<Option<BinderState>> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "Binder file missing, starting empty");
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<serde_json::Value>(&contents) {
            Ok(raw) => Ok(Some(BinderState::from_value_lenient(&raw))),
            Err(e) => {
                let moved_to = self.quarantine()?;
                tracing::error!(
                    path = %self.path.display(),
                    moved_to = %moved_to.display(),
                    error = %e,
                    "Binder file is corrupt, moved aside and starting empty"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, state: &BinderState) -> Result<()> {
        write_json_atomic(&self.path, state).map_err(|e| {
            BinderError::Persistence(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

/// Serialize `value` to a temp file next to `path`, then rename it over
/// `path`.
///
/// The rename is the commit point: until it happens the previous file stays
/// intact, and a failed write leaves no temp file behind.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryBinderStore
// ---------------------------------------------------------------------------

/// Non-durable store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryBinderStore {
    state: Mutex<Option<BinderState>>,
    fail_saves: AtomicBool,
}

impl MemoryBinderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state.
    pub fn with_state(state: BinderState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every subsequent save fail until switched back off.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The last successfully saved state.
    pub fn saved(&self) -> Option<BinderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl BinderStore for MemoryBinderStore {
    fn load(&self) -> Result<Option<BinderState>> {
        Ok(self.saved())
    }

    fn save(&self, state: &BinderState) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(BinderError::Persistence("store rejected the write".into()));
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }
}

// Shared handles can be passed to the service while the caller keeps one.
impl<S: BinderStore + ?Sized> BinderStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<BinderState>> {
        (**self).load()
    }

    fn save(&self, state: &BinderState) -> Result<()> {
        (**self).save(state)
    }
}
