//! Channel connection state machine.
//!
//! Owns the lifecycle of one physical socket bound to one logical channel.
//! Uses the action pattern: methods take time as input and return actions for
//! the driver to execute. This keeps the state machine pure (no I/O) and makes
//! testing straightforward.
//!
//! # State Machine
//!
//! ```text
//!                 socket open              abnormal close
//! ┌──────────────┐─────────────>┌───────────┐─────────────>┌──────────────┐
//! │ Disconnected │              │ Connected │              │ Reconnecting │
//! └──────────────┘<─────────────└───────────┘<─────────────└──────────────┘
//!        ^         disconnect()                 socket open        │
//!        └───────────────────────────────────────────────────────--┘
//!            disconnect() or attempt ceiling exceeded
//! ```
//!
//! The dial window between `connect()` and the first open event is observed
//! externally as still `Disconnected`; callers never special-case a third
//! public state.
//!
//! # Invariants
//!
//! - At most one live socket exists per machine; a reconnect `Dial` is only
//!   emitted after the previous socket reached a terminal close event.
//! - A pending reconnect deadline is invalidated (set to `None`) by explicit
//!   disconnect, so a stale timer can never dial after an intentional
//!   disconnect.
//! - The heartbeat deadline is cleared on every exit from `Connected`,
//!   including reconnection, so no timer leaks across socket instances.

use std::{
    ops::{Add, Sub},
    time::{Duration, Instant},
};

use chatlink_proto::{InboundEvent, OutboundIntent, decode, encode};

use crate::reconnect::ReconnectPolicy;

/// WebSocket close codes distinguishing requested from abnormal closure.
pub mod close_code {
    /// Code the client itself uses for an intentional, requested disconnect.
    pub const NORMAL: u16 = 1000;

    /// Code drivers report when a socket dies without a close frame, or when
    /// a dial attempt fails outright.
    pub const ABNORMAL: u16 = 1006;
}

/// Interval at which the connection emits keep-alive pings while connected.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Actions returned by the connection state machine.
///
/// The driver (session facade, transport task, or test) executes these:
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a new socket for this channel.
    Dial,

    /// Send this already-encoded text frame on the live socket.
    SendText(String),

    /// Close the live socket with this code.
    CloseSocket {
        /// Close code; [`close_code::NORMAL`] for requested disconnects.
        code: u16,
    },

    /// Deliver a decoded inbound event to the listener registry.
    Dispatch(InboundEvent),

    /// Observable connection status changed.
    StatusChanged(ConnectionState),
}

/// Observable status of a [`ChannelConnection`].
///
/// Transitions are driven only by socket lifecycle events and the
/// reconnection policy, never set directly by application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, none wanted (initial, after disconnect, after give-up).
    Disconnected,
    /// Socket open; heartbeats flowing.
    Connected,
    /// Socket lost abnormally; a reconnect attempt is scheduled or in flight.
    Reconnecting,
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Keep-alive emission interval while connected.
    pub heartbeat_interval: Duration,
    /// Backoff policy consulted on abnormal closure.
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL, reconnect: ReconnectPolicy::default() }
    }
}

/// State machine for one physical socket bound to one logical channel.
///
/// Pure state machine: no I/O, no timers. Deadlines are instants stored as
/// fields and checked in [`ChannelConnection::tick`]; cancelling a deadline
/// means setting the field to `None`, which structurally prevents a stale
/// timer from firing.
///
/// Generic over `I` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct ChannelConnection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    /// Current observable state.
    state: ConnectionState,
    /// Configuration.
    config: ConnectionConfig,
    /// True between `connect()` and the matching `disconnect()` or give-up.
    /// Socket events arriving outside this window belong to a torn-down
    /// socket and must not re-engage the policy.
    want_connected: bool,
    /// True while a dial was issued and no open/close event arrived yet.
    dialing: bool,
    /// Reconnect attempt counter; reset to zero on every successful open.
    attempts: u32,
    /// Next heartbeat emission deadline. `Some` only while connected.
    heartbeat_due: Option<I>,
    /// Scheduled reconnect deadline. `Some` only while reconnecting.
    reconnect_at: Option<I>,
}

impl<I> ChannelConnection<I>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    /// Create a new machine in [`ConnectionState::Disconnected`].
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            want_connected: false,
            dialing: false,
            attempts: 0,
            heartbeat_due: None,
            reconnect_at: None,
        }
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts consumed since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Scheduled reconnect deadline, if any.
    #[must_use]
    pub fn reconnect_at(&self) -> Option<I> {
        self.reconnect_at
    }

    /// Request a connection.
    ///
    /// Emits a [`ConnectionAction::Dial`]; the machine stays observably
    /// `Disconnected` until the driver reports the socket open. Calling
    /// while already wanted is a logged no-op.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.want_connected {
            tracing::warn!("connect called while already connected or connecting");
            return Vec::new();
        }

        self.want_connected = true;
        self.attempts = 0;
        self.dialing = true;

        vec![ConnectionAction::Dial]
    }

    /// Request disconnection.
    ///
    /// Always honored immediately from any state: cancels any pending
    /// reconnect deadline, disarms the heartbeat, and closes a live or
    /// in-flight socket with [`close_code::NORMAL`] so the close handler
    /// does not itself re-trigger reconnection.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.reconnect_at = None;
        self.heartbeat_due = None;

        let socket_in_flight = self.state == ConnectionState::Connected || self.dialing;
        self.dialing = false;
        self.want_connected = false;

        let mut actions = Vec::new();
        if socket_in_flight {
            actions.push(ConnectionAction::CloseSocket { code: close_code::NORMAL });
        }
        actions.extend(self.settle(ConnectionState::Disconnected));
        actions
    }

    /// The driver reports the socket opened.
    ///
    /// Resets the attempt counter and arms the heartbeat. A stale open for a
    /// socket we no longer want is closed immediately without a state change.
    pub fn socket_opened(&mut self, now: I) -> Vec<ConnectionAction> {
        if !self.want_connected {
            return vec![ConnectionAction::CloseSocket { code: close_code::NORMAL }];
        }

        self.dialing = false;
        self.attempts = 0;
        self.reconnect_at = None;
        self.heartbeat_due = Some(now + self.config.heartbeat_interval);

        self.settle(ConnectionState::Connected)
    }

    /// The driver reports the socket closed (or a dial attempt failed) with
    /// the given close code.
    ///
    /// A normal code, or any close arriving after an explicit disconnect,
    /// settles at `Disconnected`. An abnormal code engages the reconnect
    /// policy; once the attempt ceiling is exceeded the machine gives up
    /// permanently until the owner calls [`ChannelConnection::connect`].
    pub fn socket_closed(&mut self, code: u16, now: I) -> Vec<ConnectionAction> {
        self.dialing = false;
        self.heartbeat_due = None;

        if !self.want_connected || code == close_code::NORMAL {
            // Requested closure (ours or the server's): a later connect()
            // starts fresh rather than being refused as already-wanted.
            self.want_connected = false;
            self.reconnect_at = None;
            return self.settle(ConnectionState::Disconnected);
        }

        self.attempts += 1;
        match self.config.reconnect.delay(self.attempts) {
            Some(delay) => {
                self.reconnect_at = Some(now + delay);
                self.settle(ConnectionState::Reconnecting)
            },
            None => {
                tracing::warn!(
                    attempts = self.attempts,
                    "reconnect attempts exhausted, giving up"
                );
                self.want_connected = false;
                self.settle(ConnectionState::Disconnected)
            },
        }
    }

    /// Process periodic maintenance (reconnect deadline and heartbeat).
    ///
    /// Call on a fixed tick. A due reconnect deadline emits a single
    /// [`ConnectionAction::Dial`] and invalidates itself; a due heartbeat
    /// deadline emits a ping and re-arms.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        if self.state == ConnectionState::Reconnecting
            && self.reconnect_at.is_some_and(|at| now >= at)
        {
            self.reconnect_at = None;
            self.dialing = true;
            actions.push(ConnectionAction::Dial);
        }

        if self.state == ConnectionState::Connected
            && self.heartbeat_due.is_some_and(|due| now >= due)
        {
            self.heartbeat_due = Some(now + self.config.heartbeat_interval);
            actions.push(ConnectionAction::SendText(encode(&OutboundIntent::Ping)));
        }

        actions
    }

    /// Process one inbound text frame from the live socket.
    ///
    /// Malformed frames are logged and dropped; the connection stays open.
    /// Unknown event kinds produce no dispatch. Pong counts as inbound
    /// activity only; the socket close event is the authoritative liveness
    /// signal.
    pub fn handle_frame(&mut self, text: &str) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connected {
            tracing::debug!("frame received outside connected state, dropping");
            return Vec::new();
        }

        match decode(text) {
            Ok(Some(InboundEvent::Pong)) => Vec::new(),
            Ok(Some(event)) => vec![ConnectionAction::Dispatch(event)],
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!(%error, "dropping malformed inbound frame");
                Vec::new()
            },
        }
    }

    /// Send a chat message. No-op with a logged warning while not connected;
    /// never queued.
    pub fn send_message(
        &mut self,
        content: &str,
        reply_to_id: Option<&str>,
    ) -> Vec<ConnectionAction> {
        self.send_intent(&OutboundIntent::ChatMessage {
            content: content.to_string(),
            reply_to_id: reply_to_id.map(str::to_string),
        })
    }

    /// Announce local typing state. Same not-connected semantics as
    /// [`ChannelConnection::send_message`].
    pub fn send_typing(&mut self, is_typing: bool) -> Vec<ConnectionAction> {
        self.send_intent(&OutboundIntent::Typing { is_typing })
    }

    /// Mark a message as read. Same not-connected semantics as
    /// [`ChannelConnection::send_message`].
    pub fn mark_read(&mut self, message_id: &str) -> Vec<ConnectionAction> {
        self.send_intent(&OutboundIntent::MarkRead { message_id: message_id.to_string() })
    }

    fn send_intent(&mut self, intent: &OutboundIntent) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connected {
            tracing::warn!(state = ?self.state, "send attempted while not connected, dropping");
            return Vec::new();
        }

        vec![ConnectionAction::SendText(encode(intent))]
    }

    /// Move to `state`, emitting a status change only on an actual
    /// transition.
    fn settle(&mut self, state: ConnectionState) -> Vec<ConnectionAction> {
        if self.state == state {
            return Vec::new();
        }

        self.state = state;
        vec![ConnectionAction::StatusChanged(state)]
    }
}
