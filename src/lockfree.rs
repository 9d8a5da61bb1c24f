//! The atomics-and-pause-hints engine.
//!
//! =============================================================================
//! MEMORY ORDERING & SYNCHRONIZATION STRATEGY
//! =============================================================================
//!
//! Each slot's `state` is the synchronization point between exactly one
//! producer and the single consumer:
//!
//! **Producer (`reserve`):**
//! 1. `fetch_add` the engine's `next_sequence` with `Relaxed` (the return
//!    value only needs to be unique, not ordered against anything).
//! 2. `compare_exchange(Free -> Reserved, AcqRel, Acquire)`. On success,
//!    the `Acquire` half synchronizes with the consumer's prior `Release`
//!    store of `Free` for this slot, so we aren't racing the consumer's
//!    teardown of the previous occupant.
//! 3. Load `version` with `Acquire`, *after* the CAS succeeds rather than
//!    before — reading it before the CAS would span this attempt's whole
//!    retry loop with a value that could go stale if the slot cycled
//!    through a full Free->Reserved->Committed->Free round-trip while we
//!    were preempted. Reading after success narrows that window to the
//!    gap between the CAS and this load (per spec §9's "the version must
//!    be read after the state-CAS succeeds").
//! 4. Store `version + 1` with `Release` — publishes to the next reader of
//!    `version`.
//! 5. Write the payload (no atomics — protected by the CAS we just won).
//!
//! **Consumer (`commit`/`commit_n`):**
//! 1. `compare_exchange(Reserved -> Committed, AcqRel, Acquire)`. The
//!    `Acquire` half synchronizes with the producer's `AcqRel` CAS store in
//!    step 2, so the payload write from step 5 is visible here.
//! 2. Call `execute()` (no atomics — protected by the CAS).
//! 3. Store `Free` with `Release`, then load `version` with `Acquire` and
//!    store `version + 1` with `Release` (same after-the-CAS reasoning as
//!    the producer) — publishes to the next producer's step 2 `Acquire`
//!    CAS.
//!
//! On CAS failure either side backs off (via [`Backoff`]) and retries —
//! the producer with a *freshly fetched* sequence number (see `reserve`'s
//! doc comment for why burning sequence numbers on contention is correct),
//! the consumer against the *same* slot (it must not skip).
//! =============================================================================

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
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// A bounded MPSC event ring with a lock-free reserve/commit protocol.
///
/// Any number of producer threads may call [`reserve`](Self::reserve)
/// concurrently; exactly one consumer thread should call
/// [`commit`](Self::commit) / [`commit_n`](Self::commit_n).
pub struct LockFreeEngine<T> {
    ring: Box<[Slot<T>]>,
    mask: u64,
    // Padded so the hot producer-side counter never shares a line with
    // slot 0's hot fields (spec §4.5).
    next_sequence: CachePadded<AtomicU64>,
    metrics: Metrics,
    enable_metrics: bool,
}

// SAFETY: slots are only mutated by the producer that wins their
// Free->Reserved CAS and by the single consumer during commit; the CAS
// protocol enforces that exclusivity.
unsafe impl<T: Send> Send for LockFreeEngine<T> {}
unsafe impl<T: Send> Sync for LockFreeEngine<T> {}

impl<T: EventPayload> LockFreeEngine<T> {
    /// Constructs a ring sized to `next_power_of_two(capacity)`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0` (see `SPEC_FULL.md` §7 — this is the
    /// documented "halt the process" precondition check; use
    /// [`try_new`](Self::try_new) to handle it as a `Result` instead).
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
            next_sequence: CachePadded::new(AtomicU64::new(0)),
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
    /// Never fails and never times out: on contention it spins with pause
    /// hints and retries with a fresh sequence number. Because every failed
    /// attempt burns a sequence number, the sequence-number stream is not
    /// dense — that's fine, because the consumer drains by slot index via
    /// its own dense `commit`/`commit_n` calls, not by sequence number. A
    /// slot can only be Reserved by exactly one producer at a time (the CAS
    /// guarantees that), so how many sequence numbers a producer burned on
    /// the way there has no bearing on correctness — only on throughput.
    /// See `DESIGN.md`'s Open Question note; this is preserved from
    /// `original_source`'s `EventProcessorLockFree::reserve` deliberately,
    /// not an oversight.
    pub fn reserve<F>(&self, f: F) -> &T
    where
        F: FnOnce() -> T,
    {
        let mut backoff = Backoff::new();
        loop {
            let seq = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            let idx = (seq & self.mask) as usize;
            let slot = &self.ring[idx];

            match slot.state_compare_exchange(
                SlotState::Free,
                SlotState::Reserved,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // Read after the CAS succeeds, not before: narrows the
                    // ABA window to the CAS-to-store gap rather than
                    // spanning however long this attempt's retry loop ran.
                    let version = slot.version_load(Ordering::Acquire);
                    debug_assert_version_monotonic!(version, version + 1);
                    slot.version_store(version + 1, Ordering::Release);
                    // SAFETY: we just won the Free->Reserved CAS, so we are
                    // the sole writer of this slot's payload until commit.
                    unsafe { slot.write(f()) };
                    self.metrics.record_produced();
                    // SAFETY: the write above just finished; nothing else
                    // may touch the payload before this slot is committed.
                    return unsafe { slot.read() };
                }
                Err(_) => {
                    self.metrics.record_reserve_retry(self.enable_metrics);
                    backoff.snooze();
                }
            }
        }
    }

    /// Commits exactly one slot at `seq`.
    #[inline]
    pub fn commit(&self, seq: u64) {
        self.commit_n(seq, 1);
    }

    /// Commits `count` consecutive slots starting at `seq`, in ascending
    /// order. Waits (spin + pause hint) on each slot until its producer has
    /// finished reserving it; never skips ahead.
    pub fn commit_n(&self, seq: u64, count: u64) {
        for offset in 0..count {
            let idx = ((seq + offset) & self.mask) as usize;
            let slot = &self.ring[idx];
            let mut backoff = Backoff::new();

            loop {
                match slot.state_compare_exchange(
                    SlotState::Reserved,
                    SlotState::Committed,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(prev) => {
                        debug_assert_committing_reserved!(prev);
                        debug_assert_observed_initialized!(prev);
                        // SAFETY: the CAS's Acquire half synchronizes with
                        // the producer's Release publish of the payload.
                        unsafe { slot.read() }.execute();
                        slot.state_store(SlotState::Free, Ordering::Release);
                        // Read after the CAS succeeds, same reasoning as
                        // `reserve` above.
                        let version = slot.version_load(Ordering::Acquire);
                        debug_assert_version_monotonic!(version, version + 1);
                        slot.version_store(version + 1, Ordering::Release);
                        self.metrics.record_consumed();
                        break;
                    }
                    Err(_) => backoff.snooze(),
                }
            }
        }
    }
}

impl<T> Drop for LockFreeEngine<T> {
    fn drop(&mut self) {
        // Any slot left Reserved or Committed at teardown still holds a
        // live payload — drop it so we don't leak. Mirrors the teacher
        // crate's `Drop for Ring<T>`, which does the same for its
        // unconsumed [head, tail) range.
        for slot in &self.ring {
            if slot.state_load(Ordering::Relaxed) != SlotState::Free {
                // SAFETY: engine is being dropped; no concurrent producer
                // or consumer can still be touching these slots (a caller
                // that drops the engine while threads are active is
                // misusing it per spec §5 and §7).
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
        assert_eq!(LockFreeEngine::<Counter>::new(1).capacity(), 1);
        assert_eq!(LockFreeEngine::<Counter>::new(1000).capacity(), 1024);
        assert_eq!(LockFreeEngine::<Counter>::new(1024).capacity(), 1024);
    }

    #[test]
    fn zero_capacity_is_rejected_without_panicking_via_try_new() {
        assert_eq!(
            LockFreeEngine::<Counter>::try_new(0).unwrap_err(),
            EngineError::ZeroCapacity
        );
    }

    #[test]
    #[should_panic(expected = "capacity must be nonzero")]
    fn zero_capacity_panics_via_new() {
        let _ = LockFreeEngine::<Counter>::new(0);
    }

    #[test]
    fn reserve_then_commit_executes_in_order() {
        let engine = LockFreeEngine::<Counter>::new(4);
        for i in 0..4u64 {
            engine.reserve(|| Counter(i));
        }
        engine.commit_n(0, 4);
        assert_eq!(engine.metrics().produced(), 4);
        assert_eq!(engine.metrics().consumed(), 4);
    }
}
