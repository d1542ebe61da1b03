//! Environment abstraction for deterministic testing.
//!
//! Decouples transport logic from system time. Production drivers use real
//! instants and tokio sleeps; tests construct instants by hand and never
//! sleep at all.

use std::time::Duration;

/// Abstract environment providing time to driver code.
///
/// # Invariants
///
/// - `now()` never goes backwards within a single execution context;
///   subsequent calls must return times >= previous calls.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments may substitute virtual time.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::ops::Add<Duration, Output = Self::Instant>
        + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (not state machine logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
