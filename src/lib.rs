//! eventring - a bounded MPSC event-processing ring with two interchangeable
//! engines.
//!
//! Any number of producer threads reserve a slot, construct an event payload
//! in place, and hand it off; a single consumer thread commits slots in
//! order, running each payload's [`EventPayload::execute`] exactly once.
//! Both engines share the same slot layout and external contract — they
//! differ only in how they resolve producer/consumer contention:
//!
//! - [`LockFreeEngine`]: CAS loops over the slot's state, with
//!   pause-hint-and-yield backoff on contention.
//! - [`MutexEngine`]: a single `parking_lot::Mutex` plus `Condvar`.
//!
//! # Example
//!
//! ```
//! use eventring::{EventPayload, LockFreeEngine};
//!
//! struct Print(u64);
//! impl EventPayload for Print {
//!     fn execute(&self) {
//!         println!("event {}", self.0);
//!     }
//! }
//!
//! let engine = LockFreeEngine::<Print>::new(1024);
//! engine.reserve(|| Print(42));
//! engine.commit(0);
//! ```

mod backoff;
mod config;
mod error;
mod invariants;
mod lockfree;
mod mask;
mod metrics;
mod mutex;
mod payload;
mod slot;

pub use config::Config;
pub use error::EngineError;
pub use lockfree::LockFreeEngine;
pub use metrics::{Metrics, MetricsSnapshot};
pub use mutex::MutexEngine;
pub use payload::EventPayload;
