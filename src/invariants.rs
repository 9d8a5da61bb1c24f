//! Debug assertion macros for the slot-state-machine invariants documented
//! in `SPEC_FULL.md` §3. Active only in debug builds (`debug_assert!`), so
//! there is zero overhead in release builds — matching the teacher crate's
//! own `invariants.rs`, which uses the same `#[cfg(debug_assertions)]`-free
//! `debug_assert!`-based approach.

// =============================================================================
// INV-SLOT-01: Version monotonicity (spec invariant 3)
// =============================================================================

/// Assert that a slot's version only increases across a transition.
macro_rules! debug_assert_version_monotonic {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $new > $old,
            "INV-SLOT-01 violated: version went from {} to {}",
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-SLOT-02: Initialized read (spec invariant 2)
// =============================================================================

/// Assert that a payload is only read once the slot has been observed
/// Reserved or Committed (i.e. a producer finished `write` before we read).
macro_rules! debug_assert_observed_initialized {
    ($state:expr) => {
        debug_assert!(
            matches!($state, $crate::slot::SlotState::Reserved | $crate::slot::SlotState::Committed),
            "INV-SLOT-02 violated: reading payload from a slot observed {:?}",
            $state
        )
    };
}

// =============================================================================
// INV-SLOT-03: No double-commit (spec invariant 4/5, checked structurally)
// =============================================================================

/// Assert a slot claimed for commit was actually Reserved beforehand.
macro_rules! debug_assert_committing_reserved {
    ($prev:expr) => {
        debug_assert!(
            $prev == $crate::slot::SlotState::Reserved,
            "INV-SLOT-03 violated: committed a slot that was {:?}, not Reserved",
            $prev
        )
    };
}

pub(crate) use debug_assert_committing_reserved;
pub(crate) use debug_assert_observed_initialized;
pub(crate) use debug_assert_version_monotonic;
