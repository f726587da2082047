//! Per-set rarity pool catalog.
//!
//! Reads pool files (`<set_id>.json`, or `<set_id>.json.gz`) from a pools
//! directory, validates them, and caches each pool for the rest of the
//! process lifetime. Pools are loaded lazily on first access.

use crate::error::{BinderError, Result};
use crate::models::Rarity;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// CardPool
// ---------------------------------------------------------------------------

/// The immutable rarity buckets of one set.
#[derive(Debug, Clone)]
pub struct CardPool {
    pub set_id: String,
    common: Vec<String>,
    uncommon: Vec<String>,
    rare: Vec<String>,
    holo: Vec<String>,
    index: HashMap<String, Rarity>,
}

impl CardPool {
    /// Build a pool from its four buckets.
    ///
    /// Fails with [`BinderError::PoolCorrupt`] if an id repeats (within a
    /// bucket or across buckets) or if every bucket is empty.
    pub fn new(
        set_id: impl Into<String>,
        common: Vec<String>,
        uncommon: Vec<String>,
        rare: Vec<String>,
        holo: Vec<String>,
    ) -> Result<Self> {
        let set_id = set_id.into();
        let mut index = HashMap::new();
        for (rarity, bucket) in [
            (Rarity::Common, &common),
            (Rarity::Uncommon, &uncommon),
            (Rarity::Rare, &rare),
            (Rarity::Holo, &holo),
        ] {
            for card_id in bucket {
                if let Some(previous) = index.insert(card_id.clone(), rarity) {
                    let reason = if previous == rarity {
                        format!("card '{}' appears twice in '{}'", card_id, rarity)
                    } else {
                        format!(
                            "card '{}' appears in both '{}' and '{}'",
                            card_id, previous, rarity
                        )
                    };
                    return Err(BinderError::PoolCorrupt { set_id, reason });
                }
            }
        }
        if index.is_empty() {
            return Err(BinderError::PoolCorrupt {
                set_id,
                reason: "pool contains no cards".into(),
            });
        }
        Ok(Self {
            set_id,
            common,
            uncommon,
            rare,
            holo,
            index,
        })
    }

    /// Parse the JSON document of a pool file.
    ///
    /// Only the `pools` object is read; every bucket must be present and hold
    /// string ids.
    pub fn from_value(set_id: &str, data: &Value) -> Result<Self> {
        let corrupt = |reason: String| BinderError::PoolCorrupt {
            set_id: set_id.to_string(),
            reason,
        };

        let pools = data
            .get("pools")
            .and_then(|p| p.as_object())
            .ok_or_else(|| corrupt("missing 'pools' object".into()))?;

        let mut buckets: Vec<Vec<String>> = Vec::with_capacity(4);
        for rarity in Rarity::ALL {
            let values = pools
                .get(rarity.as_str())
                .ok_or_else(|| corrupt(format!("missing '{}' bucket", rarity)))?
                .as_array()
                .ok_or_else(|| corrupt(format!("'{}' must be a list", rarity)))?;
            let ids = values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(|s| s.to_string())
                        .ok_or_else(|| corrupt(format!("non-string id in '{}': {}", rarity, v)))
                })
                .collect::<Result<Vec<String>>>()?;
            buckets.push(ids);
        }

        let holo = buckets.pop().unwrap_or_default();
        let rare = buckets.pop().unwrap_or_default();
        let uncommon = buckets.pop().unwrap_or_default();
        let common = buckets.pop().unwrap_or_default();
        Self::new(set_id, common, uncommon, rare, holo)
    }

    pub fn bucket(&self, rarity: Rarity) -> &[String] {
        match rarity {
            Rarity::Common => &self.common,
            Rarity::Uncommon => &self.uncommon,
            Rarity::Rare => &self.rare,
            Rarity::Holo => &self.holo,
        }
    }

    /// Distinct card ids across all buckets.
    pub fn total_available(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.index.contains_key(card_id)
    }

    pub fn rarity_of(&self, card_id: &str) -> Option<Rarity> {
        self.index.get(card_id).copied()
    }
}

/// One entry of a set listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCard {
    pub card_id: String,
    pub rarity: Rarity,
}

// ---------------------------------------------------------------------------
// CardCatalog
// ---------------------------------------------------------------------------

/// Read-only catalog of every set's pool.
pub struct CardCatalog {
    /// Directory holding pool files. `None` for purely in-memory catalogs.
    pools_dir: Option<PathBuf>,
    pools: RwLock<HashMap<String, Arc<CardPool>>>,
}

impl CardCatalog {
    /// Open a catalog over a pools directory.
    ///
    /// No pool is read until it is first requested.
    pub fn open<P: AsRef<Path>>(pools_dir: P) -> Result<Self> {
        let dir = pools_dir.as_ref();
        if !dir.is_dir() {
            return Err(BinderError::InvalidArgument(format!(
                "Pools directory not found: {}",
                dir.display()
            )));
        }
        Ok(Self {
            pools_dir: Some(dir.to_path_buf()),
            pools: RwLock::new(HashMap::new()),
        })
    }

    /// Build a catalog from pools already in memory.
    pub fn from_pools<I: IntoIterator<Item = CardPool>>(pools: I) -> Self {
        let map = pools
            .into_iter()
            .map(|p| (p.set_id.clone(), Arc::new(p)))
            .collect();
        Self {
            pools_dir: None,
            pools: RwLock::new(map),
        }
    }

    pub fn pools_dir(&self) -> Option<&Path> {
        self.pools_dir.as_deref()
    }

    /// Every set with pool data, sorted.
    pub fn set_ids(&self) -> Result<Vec<String>> {
        let mut ids: BTreeSet<String> = self
            .pools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();

        if let Some(dir) = &self.pools_dir {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    continue;
                };
                let stem = name
                    .strip_suffix(".json.gz")
                    .or_else(|| name.strip_suffix(".json"));
                if let Some(stem) = stem.filter(|s| is_safe_segment(s)) {
                    ids.insert(stem.to_string());
                }
            }
        }

        Ok(ids.into_iter().collect())
    }

    /// Load (or return the cached) pool of a set.
    pub fn load_pool(&self, set_id: &str) -> Result<Arc<CardPool>> {
        if let Some(pool) = self
            .pools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(set_id)
        {
            return Ok(pool.clone());
        }

        let path = self
            .pool_path(set_id)
            .ok_or_else(|| BinderError::PoolNotFound(set_id.to_string()))?;
        let data = read_pool_file(set_id, &path)?;
        let pool = Arc::new(CardPool::from_value(set_id, &data)?);

        tracing::debug!(
            set_id,
            total = pool.total_available(),
            common = pool.bucket(Rarity::Common).len(),
            uncommon = pool.bucket(Rarity::Uncommon).len(),
            rare = pool.bucket(Rarity::Rare).len(),
            holo = pool.bucket(Rarity::Holo).len(),
            "Loaded rarity pool"
        );

        let mut pools = self.pools.write().unwrap_or_else(|e| e.into_inner());
        Ok(pools.entry(set_id.to_string()).or_insert(pool).clone())
    }

    /// Completion denominator for a set.
    pub fn total_available(&self, set_id: &str) -> Result<usize> {
        Ok(self.load_pool(set_id)?.total_available())
    }

    /// Whether `card_id` belongs to the pool of `set_id`. Unknown or
    /// unreadable sets contain nothing.
    pub fn contains(&self, set_id: &str, card_id: &str) -> bool {
        self.load_pool(set_id)
            .map(|p| p.contains(card_id))
            .unwrap_or(false)
    }

    /// Rarity bucket of a card, if the set and card are known.
    pub fn rarity_of(&self, set_id: &str, card_id: &str) -> Option<Rarity> {
        self.load_pool(set_id).ok()?.rarity_of(card_id)
    }

    /// Every card of a set with its rarity, bucket by bucket.
    pub fn set_catalog(&self, set_id: &str) -> Result<Vec<CatalogCard>> {
        let pool = self.load_pool(set_id)?;
        Ok(Rarity::ALL
            .iter()
            .flat_map(|&rarity| {
                pool.bucket(rarity).iter().map(move |card_id| CatalogCard {
                    card_id: card_id.clone(),
                    rarity,
                })
            })
            .collect())
    }

    /// Locate the pool file of a set, preferring the plain JSON file.
    fn pool_path(&self, set_id: &str) -> Option<PathBuf> {
        let dir = self.pools_dir.as_ref()?;
        if !is_safe_segment(set_id) {
            return None;
        }
        [format!("{set_id}.json"), format!("{set_id}.json.gz")]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }
}

/// Set ids double as file names, so only `[A-Za-z0-9_-]+` is accepted.
pub(crate) fn is_safe_segment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Load and parse a pool file (handles `.gz` transparently).
fn read_pool_file(set_id: &str, path: &Path) -> Result<Value> {
    let contents = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        let file = fs::File::open(path)?;
        let mut decoder = BufReader::new(GzDecoder::new(BufReader::new(file)));
        let mut contents = String::new();
        decoder
            .read_to_string(&mut contents)
            .map_err(|e| BinderError::PoolCorrupt {
                set_id: set_id.to_string(),
                reason: format!("unreadable gzip stream: {}", e),
            })?;
        contents
    } else {
        fs::read_to_string(path)?
    };

    serde_json::from_str(&contents).map_err(|e| BinderError::PoolCorrupt {
        set_id: set_id.to_string(),
        reason: format!(
            "{} is not valid JSON: {}",
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("pool file"),
            e
        ),
    })
}
