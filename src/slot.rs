//! The per-cell state machine both engines share: `Free -> Reserved ->
//! Committed -> Free`, plus the version counter used to defeat ABA hazards.
//!
//! `state`, `version` and the payload cell each live behind their own
//! [`CachePadded`] so that neighboring slots — and the producer/consumer
//! sides of the *same* slot — never false-share a cache line (spec §4.5).

use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// A slot's lifecycle position. Stored as a raw `u8` in an `AtomicU8` so the
/// same representation serves both the lock-free engine (real CAS) and the
/// mutex engine (plain reads/writes under the lock).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Free = 0,
    Reserved = 1,
    Committed = 2,
}

impl SlotState {
    #[inline]
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SlotState::Free,
            1 => SlotState::Reserved,
            2 => SlotState::Committed,
            other => unreachable!("corrupt slot state byte: {other}"),
        }
    }
}

/// One cell of the ring: lifecycle state, ABA-mitigating version, and
/// uninitialized-until-reserved payload storage.
pub(crate) struct Slot<T> {
    state: CachePadded<AtomicU8>,
    version: CachePadded<AtomicU64>,
    payload: CachePadded<UnsafeCell<MaybeUninit<T>>>,
}

// SAFETY: a `Slot<T>` is only ever mutated by the single producer that holds
// the Free->Reserved CAS/lock win for it, and by the single consumer during
// commit; both engines uphold that exclusivity before touching `payload`.
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: CachePadded::new(AtomicU8::new(SlotState::Free as u8)),
            version: CachePadded::new(AtomicU64::new(0)),
            payload: CachePadded::new(UnsafeCell::new(MaybeUninit::uninit())),
        }
    }

    #[inline]
    pub(crate) fn state_load(&self, order: Ordering) -> SlotState {
        SlotState::from_raw(self.state.load(order))
    }

    #[inline]
    pub(crate) fn state_store(&self, state: SlotState, order: Ordering) {
        self.state.store(state as u8, order);
    }

    /// Attempts `current -> new`. Returns the previous state either way, the
    /// same shape as `AtomicU8::compare_exchange`.
    #[inline]
    pub(crate) fn state_compare_exchange(
        &self,
        current: SlotState,
        new: SlotState,
        success: Ordering,
        failure: Ordering,
    ) -> Result<SlotState, SlotState> {
        self.state
            .compare_exchange(current as u8, new as u8, success, failure)
            .map(SlotState::from_raw)
            .map_err(SlotState::from_raw)
    }

    #[inline]
    pub(crate) fn version_load(&self, order: Ordering) -> u64 {
        self.version.load(order)
    }

    #[inline]
    pub(crate) fn version_store(&self, version: u64, order: Ordering) {
        self.version.store(version, order);
    }

    /// Constructs `value` in the slot's storage.
    ///
    /// # Safety
    ///
    /// The caller must hold exclusive producer ownership of this slot (i.e.
    /// have just won the Free->Reserved transition) and must not call this
    /// more than once per reservation.
    #[inline]
    pub(crate) unsafe fn write(&self, value: T) {
        (*self.payload.get()).as_mut_ptr().write(value);
    }

    /// Borrows the slot's payload.
    ///
    /// # Safety
    ///
    /// The caller must know the slot is currently initialized (state is, or
    /// was just, Reserved/Committed) and must not alias this with a
    /// concurrent producer write.
    #[inline]
    pub(crate) unsafe fn read(&self) -> &T {
        (*self.payload.get()).assume_init_ref()
    }

    /// Drops the payload in place, for a slot known to hold a live value.
    ///
    /// # Safety
    ///
    /// Only valid when no other reference to the payload is live and the
    /// slot will not be read again without an intervening `write`. Used
    /// solely by the owning engine's `Drop` impl for slots left non-`Free`
    /// at teardown.
    pub(crate) unsafe fn drop_in_place(&self) {
        std::ptr::drop_in_place((*self.payload.get()).as_mut_ptr());
    }
}
