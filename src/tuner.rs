//! Automatic knob tuning
//!
//! Each optimization interval the façade feeds observed rates in here and
//! applies whatever adjustments come back. Every knob moves in small steps
//! and is clamped to a fixed range, so tuning can never run a knob off a
//! cliff.

use crate::config::Strategy;
use serde::Serialize;
use tracing::info;

/// Observed rates for one optimization window
#[derive(Debug, Clone, Default)]
pub struct TuningInputs {
    pub strategy: Option<Strategy>,
    /// Overall hit rate in [0, 1]
    pub hit_rate: f64,
    /// L1 hit rate (multi-tier only)
    pub l1_hit_rate: Option<f64>,
    /// Compressions per request (multi-tier only)
    pub compression_ratio: Option<f64>,
    /// Algorithm switches this window (adaptive only)
    pub algorithm_switches: u64,
    /// Warming success rate, absent when nothing was attempted
    pub warming_success_rate: Option<f64>,
}

/// Current values of every tunable knob
#[derive(Debug, Clone, Copy)]
pub struct Knobs {
    pub hot_threshold: u32,
    pub compression_threshold: usize,
    pub switch_threshold: f64,
    pub max_size: usize,
    pub min_confidence: f64,
}

/// One adjustment decided by the tuner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TuningAction {
    LowerHotThreshold { to: u32 },
    LowerCompressionThreshold { to: usize },
    RaiseSwitchThreshold { to: f64 },
    GrowMaxSize { to: usize },
    LowerMinConfidence { to: f64 },
    RaiseMinConfidence { to: f64 },
}

/// Stateless policy: observed rates in, knob adjustments out
#[derive(Debug, Default)]
pub struct AutoTuner;

impl AutoTuner {
    pub fn new() -> Self {
        Self
    }

    /// Decide adjustments for one window
    pub fn evaluate(&self, inputs: &TuningInputs, knobs: &Knobs) -> Vec<TuningAction> {
        let mut actions = Vec::new();

        if inputs.strategy == Some(Strategy::MultiTier) {
            if let Some(l1_rate) = inputs.l1_hit_rate {
                if l1_rate < 0.5 && knobs.hot_threshold > 2 {
                    actions.push(TuningAction::LowerHotThreshold {
                        to: (knobs.hot_threshold - 1).max(2),
                    });
                }
            }
            if let Some(ratio) = inputs.compression_ratio {
                if ratio < 0.1 && knobs.compression_threshold > 512 {
                    actions.push(TuningAction::LowerCompressionThreshold { to: 512 });
                }
            }
        }

        if inputs.strategy == Some(Strategy::Adaptive)
            && inputs.algorithm_switches > 2
            && knobs.switch_threshold < 0.15
        {
            actions.push(TuningAction::RaiseSwitchThreshold {
                to: (knobs.switch_threshold + 0.02).min(0.15),
            });
        }

        if inputs.strategy == Some(Strategy::Simple)
            && inputs.hit_rate < 0.6
            && knobs.max_size < 2000
        {
            actions.push(TuningAction::GrowMaxSize {
                to: (knobs.max_size * 12 / 10).min(2000),
            });
        }

        if let Some(success) = inputs.warming_success_rate {
            if success < 0.3 && knobs.min_confidence > 0.1 {
                actions.push(TuningAction::LowerMinConfidence {
                    to: (knobs.min_confidence - 0.1).max(0.1),
                });
            } else if success > 0.8 && knobs.min_confidence < 0.8 {
                actions.push(TuningAction::RaiseMinConfidence {
                    to: (knobs.min_confidence + 0.1).min(0.8),
                });
            }
        }

        if !actions.is_empty() {
            info!(?actions, "auto-tuning adjustments");
        }
        actions
    }
}
