//! Session facades binding a connection machine to a channel identity.
//!
//! A session owns exactly one [`ChannelConnection`] and one
//! [`ListenerRegistry`], both created together and discarded together. The
//! identity inputs (channel id and auth token) are fixed at construction;
//! changing either goes through [`ChannelSession::rebind`], which is defined
//! as a full teardown followed by a fresh machine and registry. Listeners
//! registered after a rebind can therefore never observe events from the
//! previous socket.
//!
//! Sessions stay sans-IO like the machine underneath: socket effects come out
//! as [`SocketCommand`]s for a driver to execute, while decoded events and
//! status changes are dispatched to the session's own registry inline.

use std::{
    ops::{Add, Sub},
    time::{Duration, Instant},
};

use chatlink_core::{
    ChannelConnection, ConnectionAction, ConnectionConfig, ConnectionState, ListenerRegistry,
};

/// Where the backend lives.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Scheme and authority, e.g. `wss://api.example.com`. No trailing slash.
    pub base_url: String,
}

impl EndpointConfig {
    /// Socket URL for one chat channel.
    #[must_use]
    pub fn channel_url(&self, channel_id: &str, token: &str) -> String {
        format!("{}/ws/chat/{channel_id}/?token={token}", self.base_url)
    }

    /// Socket URL for the per-user notification stream.
    #[must_use]
    pub fn notification_url(&self, token: &str) -> String {
        format!("{}/ws/notifications/?token={token}", self.base_url)
    }
}

/// Socket effect for the transport driver to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    /// Open a socket to this URL.
    Dial {
        /// Fully formed socket URL, token included.
        url: String,
    },
    /// Send this text frame on the live socket.
    SendText(String),
    /// Close the live socket with this code.
    Close {
        /// WebSocket close code.
        code: u16,
    },
}

/// Shared plumbing under both session kinds: machine, registry, command
/// buffer, and the URL the next dial should use.
#[derive(Debug)]
struct SessionCore<I>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    conn: ChannelConnection<I>,
    registry: ListenerRegistry,
    commands: Vec<SocketCommand>,
    url: String,
}

impl<I> SessionCore<I>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    fn new(config: ConnectionConfig, url: String) -> Self {
        Self {
            conn: ChannelConnection::new(config),
            registry: ListenerRegistry::new(),
            commands: Vec::new(),
            url,
        }
    }

    /// Execute machine actions: socket effects go to the command buffer,
    /// events and status changes go straight to this core's registry.
    fn apply(&mut self, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::Dial => {
                    self.commands.push(SocketCommand::Dial { url: self.url.clone() });
                },
                ConnectionAction::SendText(text) => {
                    self.commands.push(SocketCommand::SendText(text));
                },
                ConnectionAction::CloseSocket { code } => {
                    self.commands.push(SocketCommand::Close { code });
                },
                ConnectionAction::Dispatch(event) => self.registry.dispatch_event(&event),
                ConnectionAction::StatusChanged(state) => self.registry.dispatch_status(state),
            }
        }
    }
}

/// Facade for one chat channel.
///
/// Bound to a `(channel_id, token)` pair. Generic over the instant type the
/// same way the machine is; production drivers use the `Instant` default.
#[derive(Debug)]
pub struct ChannelSession<I = Instant>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    endpoints: EndpointConfig,
    config: ConnectionConfig,
    channel_id: String,
    token: String,
    active: bool,
    core: SessionCore<I>,
}

impl<I> ChannelSession<I>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    /// Create a session for the given channel. No socket activity until
    /// [`ChannelSession::connect`].
    pub fn new(
        endpoints: EndpointConfig,
        config: ConnectionConfig,
        channel_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let channel_id = channel_id.into();
        let token = token.into();
        let url = endpoints.channel_url(&channel_id, &token);

        Self {
            core: SessionCore::new(config.clone(), url),
            endpoints,
            config,
            channel_id,
            token,
            active: false,
        }
    }

    /// Channel this session is bound to.
    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Current observable connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.conn.state()
    }

    /// Listener registry for this session instance.
    pub fn registry(&mut self) -> &mut ListenerRegistry {
        &mut self.core.registry
    }

    /// Request a connection.
    pub fn connect(&mut self) {
        self.active = true;
        let actions = self.core.conn.connect();
        self.core.apply(actions);
    }

    /// Request disconnection. Cancels any scheduled reconnect.
    pub fn disconnect(&mut self) {
        self.active = false;
        let actions = self.core.conn.disconnect();
        self.core.apply(actions);
    }

    /// Rebind to a different channel or token.
    ///
    /// A no-op when both inputs are unchanged. Otherwise the old machine is
    /// torn down (its close command is preserved for the driver), a fresh
    /// machine and registry are created, and the session reconnects if it was
    /// active. Listeners on the old registry are discarded with it.
    pub fn rebind(&mut self, channel_id: impl Into<String>, token: impl Into<String>) {
        let channel_id = channel_id.into();
        let token = token.into();
        if channel_id == self.channel_id && token == self.token {
            return;
        }

        tracing::info!(
            old = %self.channel_id,
            new = %channel_id,
            "rebinding channel session"
        );

        let actions = self.core.conn.disconnect();
        self.core.apply(actions);
        let pending = std::mem::take(&mut self.core.commands);

        let url = self.endpoints.channel_url(&channel_id, &token);
        self.channel_id = channel_id;
        self.token = token;
        self.core = SessionCore::new(self.config.clone(), url);
        self.core.commands = pending;

        if self.active {
            let actions = self.core.conn.connect();
            self.core.apply(actions);
        }
    }

    /// Send a chat message, optionally as a thread reply.
    pub fn send_message(&mut self, content: &str, reply_to_id: Option<&str>) {
        let actions = self.core.conn.send_message(content, reply_to_id);
        self.core.apply(actions);
    }

    /// Announce local typing state.
    pub fn send_typing(&mut self, is_typing: bool) {
        let actions = self.core.conn.send_typing(is_typing);
        self.core.apply(actions);
    }

    /// Mark a message as read.
    pub fn mark_read(&mut self, message_id: &str) {
        let actions = self.core.conn.mark_read(message_id);
        self.core.apply(actions);
    }

    /// The driver reports the socket opened.
    pub fn socket_opened(&mut self, now: I) {
        let actions = self.core.conn.socket_opened(now);
        self.core.apply(actions);
    }

    /// The driver reports the socket closed or the dial failed.
    pub fn socket_closed(&mut self, code: u16, now: I) {
        let actions = self.core.conn.socket_closed(code, now);
        self.core.apply(actions);
    }

    /// Process one inbound text frame.
    pub fn handle_frame(&mut self, text: &str) {
        let actions = self.core.conn.handle_frame(text);
        self.core.apply(actions);
    }

    /// Periodic maintenance; drives reconnect and heartbeat deadlines.
    pub fn tick(&mut self, now: I) {
        let actions = self.core.conn.tick(now);
        self.core.apply(actions);
    }

    /// Drain buffered socket commands for the driver, in order.
    pub fn take_commands(&mut self) -> Vec<SocketCommand> {
        std::mem::take(&mut self.core.commands)
    }
}

/// Facade for the per-user notification stream.
///
/// Same machine and lifecycle semantics as [`ChannelSession`], scoped to the
/// auth token only: reconnection, heartbeat, and stale-event handling behave
/// identically. The stream is receive-mostly; there are no message send
/// operations.
#[derive(Debug)]
pub struct NotificationSession<I = Instant>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    endpoints: EndpointConfig,
    config: ConnectionConfig,
    token: String,
    active: bool,
    core: SessionCore<I>,
}

impl<I> NotificationSession<I>
where
    I: Copy + Ord + Send + Sync + Add<Duration, Output = I> + Sub<Output = Duration>,
{
    /// Create a notification session for the given token.
    pub fn new(
        endpoints: EndpointConfig,
        config: ConnectionConfig,
        token: impl Into<String>,
    ) -> Self {
        let token = token.into();
        let url = endpoints.notification_url(&token);

        Self {
            core: SessionCore::new(config.clone(), url),
            endpoints,
            config,
            token,
            active: false,
        }
    }

    /// Current observable connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.conn.state()
    }

    /// Listener registry for this session instance.
    pub fn registry(&mut self) -> &mut ListenerRegistry {
        &mut self.core.registry
    }

    /// Request a connection.
    pub fn connect(&mut self) {
        self.active = true;
        let actions = self.core.conn.connect();
        self.core.apply(actions);
    }

    /// Request disconnection.
    pub fn disconnect(&mut self) {
        self.active = false;
        let actions = self.core.conn.disconnect();
        self.core.apply(actions);
    }

    /// Rebind to a different token (sign-out/sign-in). Same teardown rule as
    /// [`ChannelSession::rebind`].
    pub fn rebind(&mut self, token: impl Into<String>) {
        let token = token.into();
        if token == self.token {
            return;
        }

        let actions = self.core.conn.disconnect();
        self.core.apply(actions);
        let pending = std::mem::take(&mut self.core.commands);

        let url = self.endpoints.notification_url(&token);
        self.token = token;
        self.core = SessionCore::new(self.config.clone(), url);
        self.core.commands = pending;

        if self.active {
            let actions = self.core.conn.connect();
            self.core.apply(actions);
        }
    }

    /// The driver reports the socket opened.
    pub fn socket_opened(&mut self, now: I) {
        let actions = self.core.conn.socket_opened(now);
        self.core.apply(actions);
    }

    /// The driver reports the socket closed or the dial failed.
    pub fn socket_closed(&mut self, code: u16, now: I) {
        let actions = self.core.conn.socket_closed(code, now);
        self.core.apply(actions);
    }

    /// Process one inbound text frame.
    pub fn handle_frame(&mut self, text: &str) {
        let actions = self.core.conn.handle_frame(text);
        self.core.apply(actions);
    }

    /// Periodic maintenance.
    pub fn tick(&mut self, now: I) {
        let actions = self.core.conn.tick(now);
        self.core.apply(actions);
    }

    /// Drain buffered socket commands for the driver, in order.
    pub fn take_commands(&mut self) -> Vec<SocketCommand> {
        std::mem::take(&mut self.core.commands)
    }
}
