//! Driver-visible counters. These are engine-external bookkeeping, not part
//! of the core's correctness contract (spec §6) — a driver program watches
//! `produced`/`consumed` converge on a target count to know when a run is
//! over.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotone counters incremented by producers and the consumer.
#[derive(Debug, Default)]
pub struct Metrics {
    produced: AtomicU64,
    consumed: AtomicU64,
    reserve_retries: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reserve_retry(&self, enabled: bool) {
        if enabled {
            self.reserve_retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns the current `produced` count.
    #[inline]
    #[must_use]
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Returns the current `consumed` count.
    #[inline]
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            produced: self.produced(),
            consumed: self.consumed(),
            reserve_retries: self.reserve_retries.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`Metrics`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total successful `reserve` calls.
    pub produced: u64,
    /// Total successful single-slot commits.
    pub consumed: u64,
    /// Total reserve attempts that landed on a not-yet-Free slot and retried.
    pub reserve_retries: u64,
}
