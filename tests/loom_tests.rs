//! Loom-based exhaustive interleaving tests for the lock-free slot protocol.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! The real `LockFreeEngine` is built on `std::sync::atomic`, which loom
//! cannot instrument directly. As the teacher crate's own
//! `crates/ringmpsc/tests/loom_tests.rs` does, we model the protocol in
//! isolation with `loom`'s atomic types — here, the Free/Reserved/Committed
//! three-state CAS plus version counter, rather than the teacher's
//! head/tail SPSC pair.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use loom::sync::Arc;
use loom::thread;
use std::cell::UnsafeCell;

const FREE: u8 = 0;
const RESERVED: u8 = 1;
const COMMITTED: u8 = 2;

struct LoomSlot {
    state: AtomicU8,
    version: AtomicU64,
    payload: UnsafeCell<u64>,
}

unsafe impl Send for LoomSlot {}
unsafe impl Sync for LoomSlot {}

impl LoomSlot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(FREE),
            version: AtomicU64::new(0),
            payload: UnsafeCell::new(0),
        }
    }

    fn reserve(&self, value: u64) -> bool {
        let version = self.version.load(Ordering::Acquire);
        if self
            .state
            .compare_exchange(FREE, RESERVED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.version.store(version + 1, Ordering::Release);
            // SAFETY: we just won the Free->Reserved CAS.
            unsafe { *self.payload.get() = value };
            true
        } else {
            false
        }
    }

    fn commit(&self) -> Option<u64> {
        let version = self.version.load(Ordering::Acquire);
        if self
            .state
            .compare_exchange(RESERVED, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            // SAFETY: the CAS's Acquire half synchronizes with the
            // producer's Release store of `version`, which happened-after
            // the payload write.
            let value = unsafe { *self.payload.get() };
            self.state.store(FREE, Ordering::Release);
            self.version.store(version + 1, Ordering::Release);
            Some(value)
        } else {
            None
        }
    }
}

/// A single producer and the consumer racing on one slot: the consumer must
/// never observe a payload value other than the one the producer wrote.
#[test]
fn loom_single_slot_write_is_visible_to_commit() {
    loom::model(|| {
        let slot = Arc::new(LoomSlot::new());
        let producer_slot = Arc::clone(&slot);

        let producer = thread::spawn(move || {
            producer_slot.reserve(7);
        });

        let mut observed = None;
        for _ in 0..10 {
            if let Some(value) = slot.commit() {
                observed = Some(value);
                break;
            }
            loom::thread::yield_now();
        }

        producer.join().unwrap();

        if let Some(value) = observed {
            assert_eq!(value, 7);
        } else {
            // Consumer may have given up before the producer reserved;
            // retry once more now the producer has definitely finished.
            assert_eq!(slot.commit(), Some(7));
        }
    });
}

/// Two producers racing for the same Free slot: exactly one wins.
#[test]
fn loom_two_producers_race_for_one_slot() {
    loom::model(|| {
        let slot = Arc::new(LoomSlot::new());
        let a = Arc::clone(&slot);
        let b = Arc::clone(&slot);

        let t1 = thread::spawn(move || a.reserve(1));
        let t2 = thread::spawn(move || b.reserve(2));

        let r1 = t1.join().unwrap();
        let r2 = t2.join().unwrap();

        // Exactly one producer wins the CAS.
        assert_ne!(r1, r2);
    });
}

/// A slot cannot be committed before it has been reserved, and cannot be
/// committed twice.
#[test]
fn loom_commit_without_reserve_is_a_noop() {
    loom::model(|| {
        let slot = LoomSlot::new();
        assert_eq!(slot.commit(), None);
    });
}

/// Version strictly increases across a full reserve/commit cycle, even
/// under concurrent attempts.
#[test]
fn loom_version_advances_exactly_twice_per_successful_cycle() {
    loom::model(|| {
        let slot = Arc::new(LoomSlot::new());
        let producer_slot = Arc::clone(&slot);

        let producer = thread::spawn(move || {
            producer_slot.reserve(42);
        });

        producer.join().unwrap();
        let version_after_reserve = slot.version.load(Ordering::Acquire);
        assert_eq!(version_after_reserve, 1);

        let committed = slot.commit();
        assert_eq!(committed, Some(42));
        assert_eq!(slot.version.load(Ordering::Acquire), 2);
    });
}
