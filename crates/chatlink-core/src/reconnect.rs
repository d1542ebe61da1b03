//! Reconnection backoff policy.
//!
//! Stateless calculator: the attempt counter lives on the
//! [`crate::ChannelConnection`] that consults it. Queried only on abnormal
//! closure; an explicit disconnect never engages it.

use std::time::Duration;

/// Delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Attempts allowed before the connection gives up permanently.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff multiplier applied per consecutive failed attempt.
const BACKOFF_MULTIPLIER: u32 = 2;

/// Exponential backoff calculator for reconnection scheduling.
///
/// Delay before attempt `k` is `base × 2^(k−1)`, with `k` starting at 1.
/// Exceeding the attempt ceiling is a permanent give-up, not a retryable
/// error; the owner must call connect again to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Attempt ceiling; attempts beyond this are never scheduled.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base_delay: DEFAULT_BASE_DELAY, max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based), or `None` once the ceiling
    /// is exceeded.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        // Saturate rather than overflow for absurd ceilings; the default cap
        // of 5 keeps the factor at 16.
        let factor = BACKOFF_MULTIPLIER.checked_pow(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}
