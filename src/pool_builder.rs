//! Builds rarity pool files from per-card metadata.
//!
//! Input is one directory per set holding one JSON file per card. Each set
//! becomes `<output_dir>/<set_id>.json` in the layout [`CardCatalog`] reads,
//! with bucket counts and any anomalies recorded alongside the pools.
//!
//! [`CardCatalog`]: crate::catalog::CardCatalog

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binder::store::write_json_atomic;
use crate::catalog::is_safe_segment;
use crate::error::{BinderError, Result};
use crate::models::Rarity;

/// Map a card's rarity text and holo variant flag to a bucket.
///
/// A holo variant, or rarity text mentioning "holo", always lands in the
/// holo bucket. Otherwise the text is matched case-insensitively against
/// "uncommon", then "common", then "rare".
pub fn classify_bucket(rarity: Option<&str>, holo_variant: bool) -> Option<Rarity> {
    let normalized = rarity.unwrap_or("").trim().to_lowercase();
    if holo_variant || normalized.contains("holo") {
        Some(Rarity::Holo)
    } else if normalized.contains("uncommon") {
        Some(Rarity::Uncommon)
    } else if normalized.contains("common") {
        Some(Rarity::Common)
    } else if normalized.contains("rare") {
        Some(Rarity::Rare)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Pool file layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBuckets {
    pub common: Vec<String>,
    pub uncommon: Vec<String>,
    pub rare: Vec<String>,
    pub holo: Vec<String>,
}

impl PoolBuckets {
    fn bucket_mut(&mut self, rarity: Rarity) -> &mut Vec<String> {
        match rarity {
            Rarity::Common => &mut self.common,
            Rarity::Uncommon => &mut self.uncommon,
            Rarity::Rare => &mut self.rare,
            Rarity::Holo => &mut self.holo,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCounts {
    pub total_cards_scanned: usize,
    pub common: usize,
    pub uncommon: usize,
    pub rare: usize,
    pub holo: usize,
    pub unclassified: usize,
    pub parse_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclassifiedCard {
    pub card_id: String,
    pub rarity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAnomalies {
    pub missing_rarity: Vec<String>,
    pub unclassified_rarity: Vec<UnclassifiedCard>,
    pub parse_errors: Vec<ParseFailure>,
    /// Ids seen more than once; only the first file's bucket is kept.
    #[serde(default)]
    pub duplicate_ids: Vec<String>,
}

impl PoolAnomalies {
    pub fn total(&self) -> usize {
        self.missing_rarity.len()
            + self.unclassified_rarity.len()
            + self.parse_errors.len()
            + self.duplicate_ids.len()
    }
}

/// The document written for one set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolFile {
    pub set_id: String,
    pub generated_at_utc: DateTime<Utc>,
    pub source_dir: String,
    pub counts: PoolCounts,
    pub pools: PoolBuckets,
    pub anomalies: PoolAnomalies,
}

/// What building one set produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub set_id: String,
    pub output_file: PathBuf,
    pub counts: PoolCounts,
    pub anomalies: PoolAnomalies,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Build the pool file of the set stored in `set_dir`.
///
/// The set id is the directory name. Card files are read in name order; a
/// card's id is its `id` field, or the file stem when that is missing or
/// empty. Cards that cannot be parsed or classified are reported, not fatal.
pub fn build_set_pool<P: AsRef<Path>, Q: AsRef<Path>>(
    set_dir: P,
    output_dir: Q,
) -> Result<PoolReport> {
    let set_dir = set_dir.as_ref();
    let output_dir = output_dir.as_ref();

    let set_id = set_dir
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| is_safe_segment(n))
        .ok_or_else(|| {
            BinderError::InvalidArgument(format!(
                "Set directory name is not a valid set id: {}",
                set_dir.display()
            ))
        })?
        .to_string();

    let mut card_files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(set_dir)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if path.is_file() && is_json {
            card_files.push(path);
        }
    }
    card_files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut pools = PoolBuckets::default();
    let mut anomalies = PoolAnomalies::default();
    let mut assigned: HashMap<String, Rarity> = HashMap::new();
    let mut scanned = 0usize;

    for path in &card_files {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let data: Value = match fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
        {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(set_id = %set_id, file = %file_name, error = %error, "Unreadable card file");
                anomalies.parse_errors.push(ParseFailure {
                    file: file_name,
                    error,
                });
                continue;
            }
        };
        scanned += 1;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let card_id = card_id_of(&data).unwrap_or_else(|| stem.to_string());

        let rarity = data.get("rarity").and_then(Value::as_str);
        if rarity.is_none() {
            anomalies.missing_rarity.push(card_id.clone());
        }
        let holo_variant = data
            .get("variant_details")
            .and_then(|v| v.get("holo"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let Some(bucket) = classify_bucket(rarity, holo_variant) else {
            anomalies.unclassified_rarity.push(UnclassifiedCard {
                card_id,
                rarity: rarity.map(String::from),
            });
            continue;
        };

        if assigned.contains_key(&card_id) {
            anomalies.duplicate_ids.push(card_id);
            continue;
        }
        assigned.insert(card_id.clone(), bucket);
        pools.bucket_mut(bucket).push(card_id);
    }

    for rarity in Rarity::ALL {
        pools.bucket_mut(rarity).sort();
    }

    let counts = PoolCounts {
        total_cards_scanned: scanned,
        common: pools.common.len(),
        uncommon: pools.uncommon.len(),
        rare: pools.rare.len(),
        holo: pools.holo.len(),
        unclassified: anomalies.unclassified_rarity.len(),
        parse_errors: anomalies.parse_errors.len(),
    };

    let document = PoolFile {
        set_id: set_id.clone(),
        generated_at_utc: Utc::now(),
        source_dir: set_dir.display().to_string().replace('\\', "/"),
        counts: counts.clone(),
        pools,
        anomalies: anomalies.clone(),
    };

    let output_file = output_dir.join(format!("{set_id}.json"));
    write_json_atomic(&output_file, &document)?;

    tracing::info!(
        set_id = %set_id,
        scanned,
        common = counts.common,
        uncommon = counts.uncommon,
        rare = counts.rare,
        holo = counts.holo,
        anomalies = anomalies.total(),
        output = %output_file.display(),
        "Pool written"
    );

    Ok(PoolReport {
        set_id,
        output_file,
        counts,
        anomalies,
    })
}

/// Build a pool file for every set directory under `input_dir`, in name
/// order.
pub fn build_all_pools<P: AsRef<Path>, Q: AsRef<Path>>(
    input_dir: P,
    output_dir: Q,
) -> Result<Vec<PoolReport>> {
    let input_dir = input_dir.as_ref();
    if !input_dir.is_dir() {
        return Err(BinderError::InvalidArgument(format!(
            "Input directory not found or not a directory: {}",
            input_dir.display()
        )));
    }

    let mut set_dirs: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            set_dirs.push(path);
        }
    }
    set_dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let reports = set_dirs
        .iter()
        .map(|dir| build_set_pool(dir, output_dir.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        sets_processed = reports.len(),
        total_cards_scanned = reports.iter().map(|r| r.counts.total_cards_scanned).sum::<usize>(),
        total_anomalies = reports.iter().map(|r| r.anomalies.total()).sum::<usize>(),
        "Pools built"
    );
    Ok(reports)
}

fn card_id_of(data: &Value) -> Option<String> {
    match data.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
