//! The capability boundary engines require of whatever they store.

/// The single operation a ring payload must provide: consume it.
///
/// `execute` is called exactly once per successfully reserved slot, on the
/// consumer thread, through a shared reference. It sits on the consumer's
/// critical path and must not block indefinitely — treat it like a counter
/// increment, not an RPC.
pub trait EventPayload {
    /// Consume the event. Called exactly once, after the slot has been
    /// claimed for commit and before it is returned to `Free`.
    fn execute(&self);
}
