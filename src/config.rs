//! Configuration for the two engines.

/// Construction-time configuration shared by [`crate::LockFreeEngine`] and
/// [`crate::MutexEngine`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Requested ring capacity. Rounded up to the next power of two.
    pub capacity: u64,
    /// Whether to track the extra diagnostic `reserve_retries` counter.
    /// The `produced`/`consumed` counters are always collected — the
    /// driver relies on them to know when a run is done.
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a configuration for the given capacity, metrics disabled.
    #[must_use]
    pub const fn new(capacity: u64) -> Self {
        Self {
            capacity,
            enable_metrics: false,
        }
    }

    /// Returns a copy with `capacity` set.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Returns a copy with `enable_metrics` set.
    #[must_use]
    pub const fn with_metrics(mut self, enable_metrics: bool) -> Self {
        self.enable_metrics = enable_metrics;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1024,
            enable_metrics: false,
        }
    }
}
