//! Typing state, both directions.
//!
//! [`TypingAggregator`] consumes inbound typing signals and derives the set
//! of currently-typing users with wall-clock decay, covering the peer that
//! disconnects mid-typing without an explicit stop. [`TypingDebounce`]
//! handles the sender side: emit true on the first keystroke, false after an
//! idle window or an explicit stop.
//!
//! Both are pure over a generic instant, like the connection machine. The
//! aggregator's lifecycle follows the UI surface, not the socket: a transport
//! reconnect must not by itself clear typing state.

use std::{
    collections::HashMap,
    ops::{Add, Sub},
    time::{Duration, Instant},
};

use chatlink_proto::TypingSignal;

/// How long a typing entry survives without a refreshing signal.
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Tick interval drivers should use for decay sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Idle window after the last local input before emitting a stop signal.
pub const DEFAULT_IDLE_AFTER: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct TypingEntry<I> {
    user_name: String,
    last_signal: I,
}

/// Derived set of users currently considered to be composing a message.
///
/// The output is a projection; callers never set it directly. Entries leave
/// on an explicit false signal or once the decay timeout elapses, whichever
/// comes first.
#[derive(Debug, Clone)]
pub struct TypingAggregator<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    timeout: Duration,
    entries: HashMap<String, TypingEntry<I>>,
}

impl<I> TypingAggregator<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create an aggregator with the given decay timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, entries: HashMap::new() }
    }

    /// Consume one typing signal.
    ///
    /// True upserts the user with a refreshed timestamp; false removes the
    /// user immediately, regardless of the decay timeout.
    pub fn observe(&mut self, signal: &TypingSignal, now: I) {
        if signal.is_typing {
            self.entries.insert(
                signal.user_id.clone(),
                TypingEntry { user_name: signal.user_name.clone(), last_signal: now },
            );
        } else {
            self.entries.remove(&signal.user_id);
        }
    }

    /// Remove entries whose last signal is older than the timeout.
    ///
    /// Returns the display names that were removed, so callers can re-render
    /// only when something changed. Call on a fixed tick
    /// ([`DEFAULT_SWEEP_INTERVAL`]).
    pub fn sweep(&mut self, now: I) -> Vec<String> {
        let timeout = self.timeout;
        let mut expired = Vec::new();

        self.entries.retain(|_, entry| {
            if now - entry.last_signal > timeout {
                expired.push(entry.user_name.clone());
                false
            } else {
                true
            }
        });

        expired.sort();
        expired
    }

    /// Display names of users currently considered typing, sorted for a
    /// stable rendering order.
    #[must_use]
    pub fn currently_typing(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.entries.values().map(|entry| entry.user_name.clone()).collect();
        names.sort();
        names
    }

    /// True if no one is typing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<I> Default for TypingAggregator<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_TIMEOUT)
    }
}

/// What the debounce wants the caller to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingEmission {
    /// Emit a typing=true signal.
    Start,
    /// Emit a typing=false signal.
    Stop,
}

/// Sender-side typing emission debounce.
///
/// A single pending deadline, re-armed on every input; emitting is the
/// caller's job so this stays pure.
#[derive(Debug, Clone)]
pub struct TypingDebounce<I = Instant>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I>,
{
    idle_after: Duration,
    deadline: Option<I>,
    typing: bool,
}

impl<I> TypingDebounce<I>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I>,
{
    /// Create a debounce with the given idle window.
    pub fn new(idle_after: Duration) -> Self {
        Self { idle_after, deadline: None, typing: false }
    }

    /// Record one keystroke-equivalent input event.
    ///
    /// Returns [`TypingEmission::Start`] on the first input of a burst;
    /// subsequent inputs only re-arm the idle deadline.
    pub fn input(&mut self, now: I) -> Option<TypingEmission> {
        self.deadline = Some(now + self.idle_after);

        if self.typing {
            None
        } else {
            self.typing = true;
            Some(TypingEmission::Start)
        }
    }

    /// Check the idle deadline.
    ///
    /// Returns [`TypingEmission::Stop`] once the window elapses with no
    /// further input.
    pub fn tick(&mut self, now: I) -> Option<TypingEmission> {
        if self.typing && self.deadline.is_some_and(|deadline| now >= deadline) {
            self.deadline = None;
            self.typing = false;
            Some(TypingEmission::Stop)
        } else {
            None
        }
    }

    /// Stop immediately (message sent, input blurred).
    ///
    /// Cancels the pending deadline; emits only if currently marked typing,
    /// so a stale true-signal never lingers.
    pub fn stop(&mut self) -> Option<TypingEmission> {
        self.deadline = None;

        if self.typing {
            self.typing = false;
            Some(TypingEmission::Stop)
        } else {
            None
        }
    }

    /// True while locally marked as typing.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.typing
    }
}

impl<I> Default for TypingDebounce<I>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I>,
{
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_AFTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(user: &str, is_typing: bool) -> TypingSignal {
        TypingSignal {
            user_id: user.to_string(),
            user_name: format!("{user}-name"),
            is_typing,
        }
    }

    #[test]
    fn true_signal_upserts_and_refreshes() {
        let t0 = Instant::now();
        let mut agg: TypingAggregator<Instant> = TypingAggregator::default();

        agg.observe(&signal("u1", true), t0);
        assert_eq!(agg.currently_typing(), vec!["u1-name"]);

        // Refresh at t0+2s extends life past the original expiry.
        agg.observe(&signal("u1", true), t0 + Duration::from_secs(2));
        assert!(agg.sweep(t0 + Duration::from_secs(4)).is_empty());
        assert_eq!(agg.currently_typing(), vec!["u1-name"]);
    }

    #[test]
    fn false_signal_removes_immediately() {
        let t0 = Instant::now();
        let mut agg: TypingAggregator<Instant> = TypingAggregator::default();

        agg.observe(&signal("u1", true), t0);
        agg.observe(&signal("u1", false), t0 + Duration::from_millis(100));

        assert!(agg.is_empty());
    }

    #[test]
    fn decay_removes_exactly_once_never_before_timeout() {
        let t0 = Instant::now();
        let mut agg: TypingAggregator<Instant> = TypingAggregator::default();
        agg.observe(&signal("u1", true), t0);

        // At the timeout boundary: not yet removed (strictly exceeds).
        assert!(agg.sweep(t0 + Duration::from_secs(3)).is_empty());
        assert_eq!(agg.currently_typing(), vec!["u1-name"]);

        // Past the timeout: removed once.
        assert_eq!(agg.sweep(t0 + Duration::from_secs(4)), vec!["u1-name"]);
        assert!(agg.is_empty());

        // Subsequent sweeps report nothing.
        assert!(agg.sweep(t0 + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn decay_is_per_user() {
        let t0 = Instant::now();
        let mut agg: TypingAggregator<Instant> = TypingAggregator::default();

        agg.observe(&signal("u1", true), t0);
        agg.observe(&signal("u2", true), t0 + Duration::from_secs(2));

        assert_eq!(agg.sweep(t0 + Duration::from_secs(4)), vec!["u1-name"]);
        assert_eq!(agg.currently_typing(), vec!["u2-name"]);
    }

    #[test]
    fn projection_is_sorted() {
        let t0 = Instant::now();
        let mut agg: TypingAggregator<Instant> = TypingAggregator::default();

        agg.observe(&signal("zz", true), t0);
        agg.observe(&signal("aa", true), t0);

        assert_eq!(agg.currently_typing(), vec!["aa-name", "zz-name"]);
    }

    #[test]
    fn first_input_emits_start_once() {
        let t0 = Instant::now();
        let mut debounce: TypingDebounce<Instant> = TypingDebounce::default();

        assert_eq!(debounce.input(t0), Some(TypingEmission::Start));
        assert_eq!(debounce.input(t0 + Duration::from_millis(200)), None);
        assert!(debounce.is_typing());
    }

    #[test]
    fn idle_window_emits_stop() {
        let t0 = Instant::now();
        let mut debounce: TypingDebounce<Instant> = TypingDebounce::default();

        debounce.input(t0);
        assert_eq!(debounce.tick(t0 + Duration::from_secs(1)), None);
        assert_eq!(debounce.tick(t0 + Duration::from_secs(2)), Some(TypingEmission::Stop));

        // Emitted once; the deadline is gone.
        assert_eq!(debounce.tick(t0 + Duration::from_secs(3)), None);
    }

    #[test]
    fn input_re_arms_the_single_deadline() {
        let t0 = Instant::now();
        let mut debounce: TypingDebounce<Instant> = TypingDebounce::default();

        debounce.input(t0);
        debounce.input(t0 + Duration::from_millis(1500));

        // Old deadline (t0+2s) must not fire.
        assert_eq!(debounce.tick(t0 + Duration::from_secs(2)), None);
        assert_eq!(
            debounce.tick(t0 + Duration::from_millis(3500)),
            Some(TypingEmission::Stop)
        );
    }

    #[test]
    fn explicit_stop_cancels_and_emits() {
        let t0 = Instant::now();
        let mut debounce: TypingDebounce<Instant> = TypingDebounce::default();

        debounce.input(t0);
        assert_eq!(debounce.stop(), Some(TypingEmission::Stop));

        // Not typing anymore: stop is idempotent and the deadline is gone.
        assert_eq!(debounce.stop(), None);
        assert_eq!(debounce.tick(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn stop_without_input_emits_nothing() {
        let mut debounce: TypingDebounce<Instant> = TypingDebounce::default();
        assert_eq!(debounce.stop(), None);
    }
}
