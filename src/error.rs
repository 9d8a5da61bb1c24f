//! The core's one recoverable failure mode.
//!
//! Everything else the spec's error taxonomy describes (contention,
//! double-commit, commit-without-reserve, a panicking payload) is either
//! handled internally via retry or explicitly left undefined — see
//! `SPEC_FULL.md` §7. Zero capacity is the only misuse worth a `Result`
//! instead of a precondition `assert!`.

use thiserror::Error;

/// Errors that can occur constructing an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `Config::capacity` (or the bare `capacity` argument) was zero.
    #[error("engine capacity must be nonzero")]
    ZeroCapacity,
}
