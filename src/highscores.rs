//! Local height leaderboard
//!
//! Persisted through the key-value store, tracks the top 10 climbs.

use serde::{Deserialize, Serialize};

use crate::persistence::{KeyValueStore, keys, load_or, save_logged};
use crate::tuning::Difficulty;

/// Maximum number of records to keep
pub const MAX_HEIGHT_RECORDS: usize = 10;

/// A single finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightRecord {
    /// Maximum height reached (display units)
    pub height: u32,
    /// Coins collected during the run
    pub coins: u64,
    pub difficulty: Difficulty,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

/// Height leaderboard, sorted descending by height
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HeightRecords {
    pub entries: Vec<HeightRecord>,
}

impl HeightRecords {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Check if a height qualifies for the leaderboard
    pub fn qualifies(&self, height: u32) -> bool {
        if height == 0 {
            return false;
        }
        if self.entries.len() < MAX_HEIGHT_RECORDS {
            return true;
        }
        self.entries.last().map(|e| height > e.height).unwrap_or(true)
    }

    /// Add a run (if it qualifies).
    /// Returns the rank achieved (1-indexed) or None if it didn't qualify
    pub fn add(&mut self, record: HeightRecord) -> Option<usize> {
        if !self.qualifies(record.height) {
            return None;
        }

        let pos = self.entries.iter().position(|e| record.height > e.height);
        let rank = match pos {
            Some(i) => {
                self.entries.insert(i, record);
                i + 1
            }
            None => {
                self.entries.push(record);
                self.entries.len()
            }
        };

        self.entries.truncate(MAX_HEIGHT_RECORDS);

        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_height(&self) -> Option<u32> {
        self.entries.first().map(|e| e.height)
    }

    pub fn load(store: &dyn KeyValueStore) -> Self {
        let records: Self = load_or(store, keys::HEIGHT_RECORDS, Self::new());
        log::info!("Loaded {} height records", records.entries.len());
        records
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) {
        save_logged(store, keys::HEIGHT_RECORDS, self);
    }
}

/// Wall-clock time in ms since the Unix epoch
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
