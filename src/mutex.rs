//! The mutex-and-condvar engine.
//!
//! Where [`crate::lockfree::LockFreeEngine`] resolves contention with CAS
//! loops, this engine resolves it with a single `parking_lot::Mutex`
//! guarding the shared sequence counter, plus a `Condvar` the consumer
//! blocks on instead of spinning. `Slot`'s `state`/`version` fields stay
//! `AtomicU8`/`AtomicU64` for type-compatibility with the lock-free engine,
//! but every access here uses `Ordering::Relaxed` — the mutex is the actual
//! synchronization mechanism, so the atomics only need to not tear.
//!
//! Producers that land on a not-yet-free slot (see `reserve`) drop the
//! lock, back off, and retry with a fresh `next_sequence` value — the
//! same per-attempt `unique_lock` scope as `original_source`'s
//! `EventProcessorMutex::reserve`. Holding the lock across retries would
//! deadlock, since only the consumer's `commit_n` (which needs the same
//! lock) can ever turn that slot free. The consumer, in turn, drops the
//! lock before calling [`EventPayload::execute`] so a slow payload cannot
//! stall producers indefinitely.

use crate::backoff::Backoff;
use crate::config::Config;
use crate::error::EngineError;
use crate::invariants::{
    debug_assert_committing_reserved, debug_assert_observed_initialized,
    debug_assert_version_monotonic,
};
use crate::mask::next_power_of_two;
use crate::metrics::Metrics;
use crate::payload::EventPayload;
use crate::slot::{Slot, SlotState};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::Ordering;

/// A bounded MPSC event ring whose reserve/commit protocol is serialized by
/// a [`Mutex`] and a [`Condvar`], rather than atomics.
///
/// Any number of producer threads may call [`reserve`](Self::reserve)
/// concurrently; exactly one consumer thread should call
/// [`commit`](Self::commit) / [`commit_n`](Self::commit_n).
pub struct MutexEngine<T> {
    ring: Box<[Slot<T>]>,
    mask: u64,
    next_sequence: Mutex<u64>,
    ready: Condvar,
    metrics: Metrics,
    enable_metrics: bool,
}

// SAFETY: slot access is always performed while holding `next_sequence`'s
// lock (except for the `execute()` call itself, which the single-consumer
// precondition makes exclusive without a lock).
unsafe impl<T: Send> Send for MutexEngine<T> {}
unsafe impl<T: Send> Sync for MutexEngine<T> {}

impl<T: EventPayload> MutexEngine<T> {
    /// Constructs a ring sized to `next_power_of_two(capacity)`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`; use [`try_new`](Self::try_new) for a
    /// fallible constructor.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self::with_config(Config::new(capacity))
    }

    /// As [`new`](Self::new), but taking a full [`Config`].
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::try_with_config(config).expect("eventring: capacity must be nonzero")
    }

    /// Fallible constructor: returns `Err` instead of panicking on zero
    /// capacity.
    pub fn try_new(capacity: u64) -> Result<Self, EngineError> {
        Self::try_with_config(Config::new(capacity))
    }

    /// As [`try_new`](Self::try_new), but taking a full [`Config`].
    pub fn try_with_config(config: Config) -> Result<Self, EngineError> {
        if config.capacity == 0 {
            return Err(EngineError::ZeroCapacity);
        }
        let size = next_power_of_two(config.capacity) as usize;
        let mut ring = Vec::with_capacity(size);
        ring.resize_with(size, Slot::new);
        Ok(Self {
            ring: ring.into_boxed_slice(),
            mask: size as u64 - 1,
            next_sequence: Mutex::new(0),
            ready: Condvar::new(),
            metrics: Metrics::new(),
            enable_metrics: config.enable_metrics,
        })
    }

    /// The effective ring size (always a power of two).
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.ring.len() as u64
    }

    /// Driver-visible produced/consumed counters.
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Returns `true` iff every slot has returned to `Free`. Useful after a
    /// run to confirm the ring reached quiescence; racy if called while
    /// producers or the consumer are still active.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.ring
            .iter()
            .all(|slot| slot.state_load(Ordering::Relaxed) == SlotState::Free)
    }

    /// Returns the ABA-mitigation version counter of the slot at `index`
    /// (`index % capacity()`). Diagnostic only.
    #[must_use]
    pub fn version_of(&self, index: u64) -> u64 {
        self.ring[(index & self.mask) as usize].version_load(Ordering::Relaxed)
    }

    /// Reserves the next slot and constructs its payload from `f`.
    ///
    /// Re-acquires the engine's lock on every attempt: a producer that
    /// lands on a slot the consumer hasn't freed yet drops the lock,
    /// backs off with [`Backoff`], and retries with a fresh
    /// `next_sequence` value, exactly as `original_source`'s
    /// `EventProcessorMutex::reserve` does. Holding the lock across
    /// retries would deadlock — the only thing that can free a
    /// not-yet-drained slot is `commit_n`, which needs this same lock.
    pub fn reserve<F>(&self, f: F) -> &T
    where
        F: FnOnce() -> T,
    {
        let mut backoff = Backoff::new();
        loop {
            let mut guard = self.next_sequence.lock();
            let seq = *guard;
            let idx = (seq & self.mask) as usize;
            let slot = &self.ring[idx];

            if slot.state_load(Ordering::Relaxed) == SlotState::Free {
                *guard = seq + 1;
                let version = slot.version_load(Ordering::Relaxed);
                debug_assert_version_monotonic!(version, version + 1);
                slot.state_store(SlotState::Reserved, Ordering::Relaxed);
                slot.version_store(version + 1, Ordering::Relaxed);
                // SAFETY: the lock serializes all producers, and we just
                // observed and flipped this slot's state ourselves.
                unsafe { slot.write(f()) };
                self.metrics.record_produced();
                drop(guard);
                self.ready.notify_all();
                // SAFETY: the write above just finished under the lock; no
                // other thread may touch the payload before commit.
                return unsafe { slot.read() };
            }

            drop(guard);
            self.metrics.record_reserve_retry(self.enable_metrics);
            backoff.snooze();
        }
    }

    /// Commits exactly one slot at `seq`.
    #[inline]
    pub fn commit(&self, seq: u64) {
        self.commit_n(seq, 1);
    }

    /// Commits `count` consecutive slots starting at `seq`, in ascending
    /// order. Blocks on the engine's condvar (rather than spinning) until
    /// each slot's producer has reserved it, then releases the lock before
    /// calling `execute`.
    pub fn commit_n(&self, seq: u64, count: u64) {
        for offset in 0..count {
            let idx = ((seq + offset) & self.mask) as usize;
            let slot = &self.ring[idx];

            {
                let mut guard = self.next_sequence.lock();
                while slot.state_load(Ordering::Relaxed) != SlotState::Reserved {
                    self.ready.wait(&mut guard);
                }
            }

            let prev = slot.state_load(Ordering::Relaxed);
            debug_assert_committing_reserved!(prev);
            debug_assert_observed_initialized!(prev);
            // SAFETY: the single-consumer precondition means no other
            // thread transitions or reads this slot between our wait above
            // and the Free transition below.
            unsafe { slot.read() }.execute();

            {
                let guard = self.next_sequence.lock();
                let version = slot.version_load(Ordering::Relaxed);
                slot.state_store(SlotState::Free, Ordering::Relaxed);
                debug_assert_version_monotonic!(version, version + 1);
                slot.version_store(version + 1, Ordering::Relaxed);
                self.metrics.record_consumed();
                drop(guard);
            }
            self.ready.notify_all();
        }
    }
}

impl<T> Drop for MutexEngine<T> {
    fn drop(&mut self) {
        for slot in &self.ring {
            if slot.state_load(Ordering::Relaxed) != SlotState::Free {
                // SAFETY: engine is being dropped; no concurrent producer
                // or consumer can still be touching these slots.
                unsafe { slot.drop_in_place() };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u64);
    impl EventPayload for Counter {
        fn execute(&self) {}
    }

    #[test]
    fn rounds_capacity_up_to_a_power_of_two() {
        assert_eq!(MutexEngine::<Counter>::new(1).capacity(), 1);
        assert_eq!(MutexEngine::<Counter>::new(1000).capacity(), 1024);
        assert_eq!(MutexEngine::<Counter>::new(1024).capacity(), 1024);
    }

    #[test]
    fn zero_capacity_is_rejected_without_panicking_via_try_new() {
        assert_eq!(
            MutexEngine::<Counter>::try_new(0).unwrap_err(),
            EngineError::ZeroCapacity
        );
    }

    #[test]
    #[should_panic(expected = "capacity must be nonzero")]
    fn zero_capacity_panics_via_new() {
        let _ = MutexEngine::<Counter>::new(0);
    }

    #[test]
    fn reserve_then_commit_executes_in_order() {
        let engine = MutexEngine::<Counter>::new(4);
        for i in 0..4u64 {
            engine.reserve(|| Counter(i));
        }
        engine.commit_n(0, 4);
        assert_eq!(engine.metrics().produced(), 4);
        assert_eq!(engine.metrics().consumed(), 4);
    }
}
