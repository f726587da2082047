use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Completion of a single set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetProgress {
    pub set_id: String,
    pub owned_unique: usize,
    pub total_available: usize,
    /// Percentage rounded to two decimals.
    pub completion_percentage: f64,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Completion across every set with pool data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalProgress {
    pub owned_unique: usize,
    pub total_available: usize,
    pub completion_percentage: f64,
    pub remaining: usize,
    pub per_set: BTreeMap<String, SetProgress>,
}

/// `100 * owned / total`, rounded to two decimals; 0 for an empty set.
pub fn completion_percentage(owned: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = owned as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
