//! Property-based tests for the reconnection schedule.
//!
//! Verifies the backoff contract for ALL failure sequences, not just
//! examples: the delay before attempt k is `base × 2^(k−1)`, and no attempt
//! is ever scheduled past the ceiling.

use std::time::{Duration, Instant};

use chatlink_core::{
    ChannelConnection, ConnectionAction, ConnectionConfig, ConnectionState, ReconnectPolicy,
    close_code,
};
use proptest::prelude::*;

fn config(base_ms: u64, max_attempts: u32) -> ConnectionConfig {
    ConnectionConfig {
        reconnect: ReconnectPolicy { base_delay: Duration::from_millis(base_ms), max_attempts },
        ..ConnectionConfig::default()
    }
}

fn has_dial(actions: &[ConnectionAction]) -> bool {
    actions.iter().any(|a| matches!(a, ConnectionAction::Dial))
}

#[test]
fn prop_delay_before_attempt_k_is_base_times_two_to_k_minus_one() {
    proptest!(|(base_ms in 1_u64..5_000, max_attempts in 1_u32..10)| {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(base_ms),
            max_attempts,
        };

        for attempt in 1..=max_attempts {
            let expected = Duration::from_millis(base_ms) * 2_u32.pow(attempt - 1);
            prop_assert_eq!(policy.delay(attempt), Some(expected));
        }

        // PROPERTY: Nothing is scheduled past the ceiling.
        prop_assert_eq!(policy.delay(max_attempts + 1), None);
    });
}

#[test]
fn prop_machine_schedules_each_attempt_at_the_policy_delay() {
    proptest!(|(base_ms in 1_u64..1_000, max_attempts in 1_u32..8)| {
        let mut conn: ChannelConnection<Instant> =
            ChannelConnection::new(config(base_ms, max_attempts));
        let t0 = Instant::now();

        conn.connect();
        conn.socket_opened(t0);

        let mut now = t0;
        for attempt in 1..=max_attempts {
            conn.socket_closed(close_code::ABNORMAL, now);
            prop_assert_eq!(conn.state(), ConnectionState::Reconnecting);

            let delay = Duration::from_millis(base_ms) * 2_u32.pow(attempt - 1);

            // One instant before the deadline: nothing fires.
            if delay > Duration::from_millis(1) {
                prop_assert!(!has_dial(&conn.tick(now + delay - Duration::from_millis(1))));
            }

            // At the deadline: exactly one dial.
            now = now + delay;
            prop_assert!(has_dial(&conn.tick(now)));
            prop_assert!(!has_dial(&conn.tick(now)));
        }

        // Final failure exceeds the ceiling: permanent give-up.
        conn.socket_closed(close_code::ABNORMAL, now);
        prop_assert_eq!(conn.state(), ConnectionState::Disconnected);
        prop_assert!(!has_dial(&conn.tick(now + Duration::from_secs(86_400))));
    });
}

#[test]
fn prop_disconnect_at_any_point_stops_all_reconnection() {
    proptest!(|(base_ms in 1_u64..1_000, failures_before_disconnect in 0_u32..5)| {
        let mut conn: ChannelConnection<Instant> = ChannelConnection::new(config(base_ms, 5));
        let t0 = Instant::now();

        conn.connect();
        conn.socket_opened(t0);

        let mut now = t0;
        for _ in 0..failures_before_disconnect {
            conn.socket_closed(close_code::ABNORMAL, now);
            now = now + Duration::from_secs(60);
            conn.tick(now);
            // Attempt fails too.
            conn.socket_closed(close_code::ABNORMAL, now);
        }

        conn.disconnect();
        prop_assert_eq!(conn.state(), ConnectionState::Disconnected);

        // PROPERTY: No dial ever fires after an explicit disconnect.
        for step in 1..20_u64 {
            prop_assert!(!has_dial(&conn.tick(now + Duration::from_secs(step * 60))));
        }
    });
}
