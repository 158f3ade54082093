//! Access-temperature tracking
//!
//! A bounded side table of per-key access records that outlives the entries
//! themselves, so a re-inserted key keeps its history and lands in the right
//! tier. The decayed score divides the access count by the number of elapsed
//! windows since first sight, which cools keys that were busy long ago.

use crate::clock::ClockRef;
use indexmap::IndexMap;
use serde::Serialize;

/// Tier classification for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Cold,
    Warm,
    Hot,
}

/// Per-key access history
#[derive(Debug, Clone)]
pub struct TemperatureRecord {
    pub count: u32,
    pub first_seen: u64,
    pub last_seen: u64,
}

impl TemperatureRecord {
    /// Access count divided by elapsed windows since first sight
    pub fn decayed_score(&self, now: u64, window_ms: u64) -> f64 {
        let windows = now.saturating_sub(self.first_seen) / window_ms.max(1);
        self.count as f64 / windows.max(1) as f64
    }
}

/// Bounded table of temperature records
pub struct TemperatureTracker {
    /// Records in update order (front = least recently updated)
    records: IndexMap<String, TemperatureRecord>,
    capacity: usize,
    window_ms: u64,
    hot_threshold: u32,
    warm_threshold: u32,
    clock: ClockRef,
}

impl TemperatureTracker {
    pub fn new(
        capacity: usize,
        window_ms: u64,
        hot_threshold: u32,
        warm_threshold: u32,
        clock: ClockRef,
    ) -> Self {
        Self {
            records: IndexMap::new(),
            capacity: capacity.max(1),
            window_ms: window_ms.max(1),
            hot_threshold: hot_threshold.max(1),
            warm_threshold: warm_threshold.max(1),
            clock,
        }
    }

    /// Record one access and return the key's classification afterwards
    pub fn record_access(&mut self, key: &str) -> Temperature {
        let now = self.clock.now_ms();

        let mut record = self
            .records
            .shift_remove(key)
            .unwrap_or(TemperatureRecord {
                count: 0,
                first_seen: now,
                last_seen: now,
            });
        record.count = record.count.saturating_add(1);
        record.last_seen = now;

        let temperature = self.classify_record(&record, now);
        self.records.insert(key.to_string(), record);

        while self.records.len() > self.capacity {
            self.records.shift_remove_index(0);
        }

        temperature
    }

    /// Classify from prior accesses only; unknown keys are cold
    pub fn classify(&self, key: &str) -> Temperature {
        let now = self.clock.now_ms();
        match self.records.get(key) {
            Some(record) => self.classify_record(record, now),
            None => Temperature::Cold,
        }
    }

    pub fn record(&self, key: &str) -> Option<&TemperatureRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn hot_threshold(&self) -> u32 {
        self.hot_threshold
    }

    pub fn set_hot_threshold(&mut self, threshold: u32) {
        self.hot_threshold = threshold.max(1);
    }

    pub fn warm_threshold(&self) -> u32 {
        self.warm_threshold
    }

    fn classify_record(&self, record: &TemperatureRecord, now: u64) -> Temperature {
        let score = record.decayed_score(now, self.window_ms);
        if record.count >= self.hot_threshold && score >= self.hot_threshold as f64 {
            Temperature::Hot
        } else if record.count >= self.warm_threshold {
            Temperature::Warm
        } else {
            Temperature::Cold
        }
    }
}

impl std::fmt::Debug for TemperatureTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemperatureTracker")
            .field("records", &self.records.len())
            .field("capacity", &self.capacity)
            .field("hot_threshold", &self.hot_threshold)
            .field("warm_threshold", &self.warm_threshold)
            .finish()
    }
}
