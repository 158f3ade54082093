//! Access-pattern analysis
//!
//! Records who touched which key and when, in three shapes: temporal
//! histograms (hour of day, day of week), sequential transitions (which key
//! tends to follow which for a given user), and per-user affinity.
//! Predictions rank candidate keys for the warming subsystem.
//!
//! The table is bounded; the least-recently-updated record is dropped when
//! the cap is exceeded.

use crate::clock::ClockRef;
use chrono::{DateTime, Datelike, Timelike};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

// weights for the combined prediction score
const W_SEQUENTIAL: f64 = 0.35;
const W_TEMPORAL: f64 = 0.30;
const W_AFFINITY: f64 = 0.20;
const W_FREQUENCY: f64 = 0.15;

/// Caller-supplied context for an access or a prediction request
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    pub user_id: Option<String>,
    /// Wall-clock milliseconds; the analyzer clock is used when absent
    pub timestamp_ms: Option<u64>,
}

impl AccessContext {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            timestamp_ms: None,
        }
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// What drove a prediction's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionReason {
    Temporal,
    Sequential,
    UserAffinity,
    Frequency,
}

/// A ranked candidate for cache warming
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub key: String,
    /// Combined score in [0, 1]
    pub score: f64,
    /// Sample-count confidence in [0, 1]
    pub confidence: f64,
    pub reason: PredictionReason,
}

/// Per-key access history
#[derive(Debug, Clone, Default)]
struct PatternRecord {
    hourly: [u32; 24],
    weekday: [u32; 7],
    /// Keys observed immediately after this one (same user)
    followed_by: HashMap<String, u32>,
    per_user: HashMap<String, u32>,
    total: u64,
}

/// Bounded table of access patterns with prediction generation
pub struct PatternAnalyzer {
    /// Records in update order (front = least recently updated)
    patterns: IndexMap<String, PatternRecord>,
    last_key_by_user: HashMap<String, String>,
    total_accesses: u64,
    max_patterns: usize,
    max_predictions: usize,
    min_samples: u64,
    clock: ClockRef,
}

impl PatternAnalyzer {
    pub fn new(
        max_patterns: usize,
        max_predictions: usize,
        min_samples: u64,
        clock: ClockRef,
    ) -> Self {
        Self {
            patterns: IndexMap::new(),
            last_key_by_user: HashMap::new(),
            total_accesses: 0,
            max_patterns: max_patterns.max(1),
            max_predictions: max_predictions.max(1),
            min_samples: min_samples.max(1),
            clock,
        }
    }

    /// Record one access
    pub fn record_access(&mut self, key: &str, context: &AccessContext) {
        let now = context
            .timestamp_ms
            .unwrap_or_else(|| self.clock.now_ms());
        let hour = hour_of(now);
        let weekday = weekday_of(now);

        if let Some(user) = &context.user_id {
            if let Some(previous) = self.last_key_by_user.get(user) {
                if previous != key {
                    let previous = previous.clone();
                    if let Some(record) = self.patterns.get_mut(&previous) {
                        *record.followed_by.entry(key.to_string()).or_insert(0) += 1;
                    }
                }
            }
            self.last_key_by_user
                .insert(user.clone(), key.to_string());
        }

        let mut record = self.patterns.shift_remove(key).unwrap_or_default();
        record.hourly[hour] += 1;
        record.weekday[weekday] += 1;
        record.total += 1;
        if let Some(user) = &context.user_id {
            *record.per_user.entry(user.clone()).or_insert(0) += 1;
        }
        self.patterns.insert(key.to_string(), record);
        self.total_accesses += 1;

        while self.patterns.len() > self.max_patterns {
            self.patterns.shift_remove_index(0);
        }
    }

    /// Rank likely-next keys for a context
    pub fn generate_predictions(&self, context: &AccessContext) -> Vec<Prediction> {
        let now = context
            .timestamp_ms
            .unwrap_or_else(|| self.clock.now_ms());
        let hour = hour_of(now);

        let last_key = context
            .user_id
            .as_ref()
            .and_then(|user| self.last_key_by_user.get(user));
        let transitions = last_key.and_then(|key| self.patterns.get(key));
        let transition_total: u32 = transitions
            .map(|record| record.followed_by.values().sum())
            .unwrap_or(0);

        let mut predictions: Vec<Prediction> = self
            .patterns
            .iter()
            .filter(|(key, _)| Some(*key) != last_key)
            .filter_map(|(key, record)| {
                let temporal = record.hourly[hour] as f64 / record.total.max(1) as f64;
                let frequency = record.total as f64 / self.total_accesses.max(1) as f64;

                let sequential = match (transitions, transition_total) {
                    (Some(source), total) if total > 0 => {
                        source.followed_by.get(key).copied().unwrap_or(0) as f64 / total as f64
                    }
                    _ => 0.0,
                };

                let affinity = context
                    .user_id
                    .as_ref()
                    .and_then(|user| record.per_user.get(user))
                    .map(|count| *count as f64 / record.total.max(1) as f64)
                    .unwrap_or(0.0);

                let weighted = [
                    (W_SEQUENTIAL * sequential, PredictionReason::Sequential),
                    (W_TEMPORAL * temporal, PredictionReason::Temporal),
                    (W_AFFINITY * affinity, PredictionReason::UserAffinity),
                    (W_FREQUENCY * frequency, PredictionReason::Frequency),
                ];
                let score: f64 = weighted.iter().map(|(w, _)| w).sum::<f64>().min(1.0);
                if score <= 0.0 {
                    return None;
                }

                let reason = weighted
                    .iter()
                    .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(_, reason)| *reason)
                    .unwrap_or(PredictionReason::Frequency);

                Some(Prediction {
                    key: key.clone(),
                    score,
                    confidence: (record.total as f64 / self.min_samples as f64).min(1.0),
                    reason,
                })
            })
            .collect();

        predictions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        predictions.truncate(self.max_predictions);
        predictions
    }

    /// Number of tracked keys
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Most recent key a user touched
    pub fn last_key_for(&self, user: &str) -> Option<&str> {
        self.last_key_by_user.get(user).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.last_key_by_user.clear();
        self.total_accesses = 0;
    }
}

impl std::fmt::Debug for PatternAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternAnalyzer")
            .field("patterns", &self.patterns.len())
            .field("total_accesses", &self.total_accesses)
            .finish()
    }
}

fn hour_of(timestamp_ms: u64) -> usize {
    DateTime::from_timestamp_millis(timestamp_ms as i64)
        .map(|dt| dt.hour() as usize)
        .unwrap_or(0)
}

fn weekday_of(timestamp_ms: u64) -> usize {
    DateTime::from_timestamp_millis(timestamp_ms as i64)
        .map(|dt| dt.weekday().num_days_from_sunday() as usize)
        .unwrap_or(0)
}
