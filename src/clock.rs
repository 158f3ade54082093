//! Time source abstraction
//!
//! Every expiry and ordering decision in the engine goes through a [`Clock`]
//! so that tests can run on a manual clock and background timers stay
//! deterministic.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond time source
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;
}

/// Shared clock handle
pub type ClockRef = Arc<dyn Clock>;

/// Default clock for a shared handle
pub fn system_clock() -> ClockRef {
    Arc::new(SystemClock::new())
}

// =============================================================================
// System Clock
// =============================================================================

/// Wall-process monotonic clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// =============================================================================
// Manual Clock
// =============================================================================

/// Hand-advanced clock for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock at t=0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock at a specific time
    pub fn at(ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(ms),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time. Panics if the jump would go backwards.
    pub fn set(&self, ms: u64) {
        let prev = self.now_ms.swap(ms, Ordering::SeqCst);
        assert!(prev <= ms, "manual clock moved backwards: {} -> {}", prev, ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
