//! Tokio/tungstenite transport driver.
//!
//! Spawns one task per session. The task owns the session, the socket, and
//! the typing state; callers talk to it over channels and receive decoded
//! events back the same way. All timing decisions stay in the sans-IO layer;
//! this file only executes [`SocketCommand`]s and feeds socket events and
//! ticks back in.

use std::{future::Future, pin::Pin, time::Duration};

use chatlink_core::{
    ConnectionConfig, ConnectionState, Environment, ListenerRegistry, PresenceUpdate,
    ReactionUpdate, TypingAggregator, TypingDebounce, TypingEmission, close_code,
    typing::DEFAULT_SWEEP_INTERVAL,
};
use chatlink_proto::{ChatMessage, MessageDelete, MessageEdit, TypingSignal};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self, Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use crate::{
    error::TransportError,
    session::{ChannelSession, EndpointConfig, NotificationSession, SocketCommand},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production environment: real monotonic time, tokio sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioEnv;

impl Environment for TokioEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Operations accepted by a running channel task.
#[derive(Debug, Clone)]
pub enum ChannelOp {
    /// Open the socket.
    Connect,
    /// Close the socket and stop reconnecting.
    Disconnect,
    /// Send a chat message, optionally as a thread reply. Implies the local
    /// user stopped typing.
    SendMessage {
        /// Message body.
        content: String,
        /// Parent message id when replying in a thread.
        reply_to_id: Option<String>,
    },
    /// One keystroke-equivalent input event; drives the typing debounce.
    Input,
    /// The local user stopped composing (sent, cleared, or blurred).
    StopTyping,
    /// Mark a message as read.
    MarkRead {
        /// Id of the message that was read.
        message_id: String,
    },
    /// Switch the task to a different channel or token.
    Rebind {
        /// New channel id.
        channel_id: String,
        /// New auth token.
        token: String,
    },
}

/// Operations accepted by a running notification task.
#[derive(Debug, Clone)]
pub enum NotificationOp {
    /// Open the socket.
    Connect,
    /// Close the socket and stop reconnecting.
    Disconnect,
    /// Switch to a different auth token (sign-out/sign-in).
    Rebind {
        /// New auth token.
        token: String,
    },
}

/// Decoded events and derived state flowing out of a transport task.
#[derive(Debug, Clone)]
pub enum ChannelNotice {
    /// Connection status changed.
    Status(ConnectionState),
    /// New chat message.
    Message(ChatMessage),
    /// New reply inside a thread.
    ThreadReply(ChatMessage),
    /// A message was edited.
    Edited(MessageEdit),
    /// A message was deleted.
    Deleted(MessageDelete),
    /// A user joined or left.
    Presence(PresenceUpdate),
    /// A reaction was added or removed.
    Reaction(ReactionUpdate),
    /// The set of currently-typing display names changed.
    TypingChanged(Vec<String>),
}

/// Handle to a spawned channel task.
#[derive(Debug)]
pub struct ChannelHandle {
    /// Operations into the task.
    pub ops: mpsc::Sender<ChannelOp>,
    /// Events out of the task.
    pub notices: mpsc::UnboundedReceiver<ChannelNotice>,
    abort: tokio::task::AbortHandle,
}

impl ChannelHandle {
    /// Abort the task. The socket is dropped without a close handshake.
    pub fn stop(&self) {
        self.abort.abort();
    }
}

/// Handle to a spawned notification task.
#[derive(Debug)]
pub struct NotificationHandle {
    /// Operations into the task.
    pub ops: mpsc::Sender<NotificationOp>,
    /// Events out of the task.
    pub notices: mpsc::UnboundedReceiver<ChannelNotice>,
    abort: tokio::task::AbortHandle,
}

impl NotificationHandle {
    /// Abort the task. The socket is dropped without a close handshake.
    pub fn stop(&self) {
        self.abort.abort();
    }
}

/// Spawn the driver task for one chat channel.
///
/// Must be called within a tokio runtime. The task exits when the ops sender
/// is dropped.
pub fn spawn_channel<E>(
    env: E,
    endpoints: EndpointConfig,
    config: ConnectionConfig,
    channel_id: impl Into<String>,
    token: impl Into<String>,
) -> ChannelHandle
where
    E: Environment,
    E::Instant: 'static,
{
    let (ops_tx, ops_rx) = mpsc::channel(32);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let session = ChannelSession::new(endpoints, config, channel_id, token);

    let task = tokio::spawn(run_channel(env, session, ops_rx, notice_tx));
    ChannelHandle { ops: ops_tx, notices: notice_rx, abort: task.abort_handle() }
}

/// Spawn the driver task for the per-user notification stream.
pub fn spawn_notifications<E>(
    env: E,
    endpoints: EndpointConfig,
    config: ConnectionConfig,
    token: impl Into<String>,
) -> NotificationHandle
where
    E: Environment,
    E::Instant: 'static,
{
    let (ops_tx, ops_rx) = mpsc::channel(32);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let session = NotificationSession::new(endpoints, config, token);

    let task = tokio::spawn(run_notifications(env, session, ops_rx, notice_tx));
    NotificationHandle { ops: ops_tx, notices: notice_rx, abort: task.abort_handle() }
}

/// Periodic tick that survives select races.
///
/// The armed sleep is stored across loop iterations and re-armed only when it
/// completes, so another select branch winning does not reset the deadline.
/// Sustained sub-period traffic can therefore never starve heartbeats or
/// typing sweeps.
struct Ticker<E: Environment> {
    env: E,
    period: Duration,
    armed: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl<E: Environment> Ticker<E> {
    fn new(env: &E, period: Duration) -> Self {
        Self { env: env.clone(), period, armed: arm(env.clone(), period) }
    }

    /// Resolve at the current deadline, then arm the next one.
    async fn tick(&mut self) {
        self.armed.as_mut().await;
        self.armed = arm(self.env.clone(), self.period);
    }
}

fn arm<E: Environment>(env: E, period: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move { env.sleep(period).await })
}

/// Socket-facing surface shared by both session kinds.
trait SocketDriven<I> {
    fn take_commands(&mut self) -> Vec<SocketCommand>;
    fn socket_opened(&mut self, now: I);
    fn socket_closed(&mut self, code: u16, now: I);
    fn handle_frame(&mut self, text: &str);
}

impl<I> SocketDriven<I> for ChannelSession<I>
where
    I: Copy
        + Ord
        + Send
        + Sync
        + std::ops::Add<Duration, Output = I>
        + std::ops::Sub<Output = Duration>,
{
    fn take_commands(&mut self) -> Vec<SocketCommand> {
        Self::take_commands(self)
    }

    fn socket_opened(&mut self, now: I) {
        Self::socket_opened(self, now);
    }

    fn socket_closed(&mut self, code: u16, now: I) {
        Self::socket_closed(self, code, now);
    }

    fn handle_frame(&mut self, text: &str) {
        Self::handle_frame(self, text);
    }
}

impl<I> SocketDriven<I> for NotificationSession<I>
where
    I: Copy
        + Ord
        + Send
        + Sync
        + std::ops::Add<Duration, Output = I>
        + std::ops::Sub<Output = Duration>,
{
    fn take_commands(&mut self) -> Vec<SocketCommand> {
        Self::take_commands(self)
    }

    fn socket_opened(&mut self, now: I) {
        Self::socket_opened(self, now);
    }

    fn socket_closed(&mut self, code: u16, now: I) {
        Self::socket_closed(self, code, now);
    }

    fn handle_frame(&mut self, text: &str) {
        Self::handle_frame(self, text);
    }
}

async fn run_channel<E>(
    env: E,
    mut session: ChannelSession<E::Instant>,
    mut ops: mpsc::Receiver<ChannelOp>,
    notices: mpsc::UnboundedSender<ChannelNotice>,
) where
    E: Environment,
    E::Instant: 'static,
{
    let (typing_tx, mut typing_rx) = mpsc::unbounded_channel::<TypingSignal>();
    wire_channel_notices(session.registry(), &notices, &typing_tx);

    let mut socket: Option<WsStream> = None;
    let mut aggregator: TypingAggregator<E::Instant> = TypingAggregator::default();
    let mut debounce: TypingDebounce<E::Instant> = TypingDebounce::default();
    let mut ticker = Ticker::new(&env, DEFAULT_SWEEP_INTERVAL);

    loop {
        execute_commands(&env, &mut session, &mut socket).await;

        tokio::select! {
            op = ops.recv() => {
                let Some(op) = op else { break };
                match op {
                    ChannelOp::Connect => session.connect(),
                    ChannelOp::Disconnect => session.disconnect(),
                    ChannelOp::SendMessage { content, reply_to_id } => {
                        if debounce.stop() == Some(TypingEmission::Stop) {
                            session.send_typing(false);
                        }
                        session.send_message(&content, reply_to_id.as_deref());
                    },
                    ChannelOp::Input => {
                        if debounce.input(env.now()) == Some(TypingEmission::Start) {
                            session.send_typing(true);
                        }
                    },
                    ChannelOp::StopTyping => {
                        if debounce.stop() == Some(TypingEmission::Stop) {
                            session.send_typing(false);
                        }
                    },
                    ChannelOp::MarkRead { message_id } => session.mark_read(&message_id),
                    ChannelOp::Rebind { channel_id, token } => {
                        session.rebind(channel_id, token);
                        // Fresh registry after a rebind; re-attach forwarding.
                        wire_channel_notices(session.registry(), &notices, &typing_tx);
                    },
                }
            },
            frame = next_frame(&mut socket) => {
                handle_socket_event(&env, &mut session, &mut socket, frame);
            },
            () = ticker.tick() => {
                let now = env.now();
                session.tick(now);
                if debounce.tick(now) == Some(TypingEmission::Stop) {
                    session.send_typing(false);
                }
                if !aggregator.sweep(now).is_empty() {
                    let _ = notices
                        .send(ChannelNotice::TypingChanged(aggregator.currently_typing()));
                }
            },
        }

        // Inbound typing signals captured during frame dispatch.
        let mut typing_changed = false;
        while let Ok(signal) = typing_rx.try_recv() {
            aggregator.observe(&signal, env.now());
            typing_changed = true;
        }
        if typing_changed {
            let _ = notices.send(ChannelNotice::TypingChanged(aggregator.currently_typing()));
        }
    }
}

async fn run_notifications<E>(
    env: E,
    mut session: NotificationSession<E::Instant>,
    mut ops: mpsc::Receiver<NotificationOp>,
    notices: mpsc::UnboundedSender<ChannelNotice>,
) where
    E: Environment,
    E::Instant: 'static,
{
    wire_notification_notices(session.registry(), &notices);

    let mut socket: Option<WsStream> = None;
    let mut ticker = Ticker::new(&env, DEFAULT_SWEEP_INTERVAL);

    loop {
        execute_commands(&env, &mut session, &mut socket).await;

        tokio::select! {
            op = ops.recv() => {
                let Some(op) = op else { break };
                match op {
                    NotificationOp::Connect => session.connect(),
                    NotificationOp::Disconnect => session.disconnect(),
                    NotificationOp::Rebind { token } => {
                        session.rebind(token);
                        wire_notification_notices(session.registry(), &notices);
                    },
                }
            },
            frame = next_frame(&mut socket) => {
                handle_socket_event(&env, &mut session, &mut socket, frame);
            },
            () = ticker.tick() => {
                session.tick(env.now());
            },
        }
    }
}

fn wire_channel_notices(
    registry: &mut ListenerRegistry,
    notices: &mpsc::UnboundedSender<ChannelNotice>,
    typing: &mpsc::UnboundedSender<TypingSignal>,
) {
    let tx = notices.clone();
    registry.status().subscribe(move |state: &ConnectionState| {
        let _ = tx.send(ChannelNotice::Status(*state));
    });
    let tx = notices.clone();
    registry.messages().subscribe(move |msg: &ChatMessage| {
        let _ = tx.send(ChannelNotice::Message(msg.clone()));
    });
    let tx = notices.clone();
    registry.thread_replies().subscribe(move |msg: &ChatMessage| {
        let _ = tx.send(ChannelNotice::ThreadReply(msg.clone()));
    });
    let tx = notices.clone();
    registry.edits().subscribe(move |edit: &MessageEdit| {
        let _ = tx.send(ChannelNotice::Edited(edit.clone()));
    });
    let tx = notices.clone();
    registry.deletes().subscribe(move |delete: &MessageDelete| {
        let _ = tx.send(ChannelNotice::Deleted(delete.clone()));
    });
    let tx = notices.clone();
    registry.presence().subscribe(move |update: &PresenceUpdate| {
        let _ = tx.send(ChannelNotice::Presence(update.clone()));
    });
    let tx = notices.clone();
    registry.reactions().subscribe(move |update: &ReactionUpdate| {
        let _ = tx.send(ChannelNotice::Reaction(update.clone()));
    });
    let tx = typing.clone();
    registry.typing().subscribe(move |signal: &TypingSignal| {
        let _ = tx.send(signal.clone());
    });
}

fn wire_notification_notices(
    registry: &mut ListenerRegistry,
    notices: &mpsc::UnboundedSender<ChannelNotice>,
) {
    let tx = notices.clone();
    registry.status().subscribe(move |state: &ConnectionState| {
        let _ = tx.send(ChannelNotice::Status(*state));
    });
    let tx = notices.clone();
    registry.messages().subscribe(move |msg: &ChatMessage| {
        let _ = tx.send(ChannelNotice::Message(msg.clone()));
    });
    let tx = notices.clone();
    registry.presence().subscribe(move |update: &PresenceUpdate| {
        let _ = tx.send(ChannelNotice::Presence(update.clone()));
    });
}

/// Drain and execute buffered socket commands until the session has none.
///
/// Executing a command can produce more (a failed dial schedules nothing
/// immediately, but a stale-open close does), so this loops to a fixpoint.
async fn execute_commands<E, S>(env: &E, session: &mut S, socket: &mut Option<WsStream>)
where
    E: Environment,
    S: SocketDriven<E::Instant>,
{
    loop {
        let commands = session.take_commands();
        if commands.is_empty() {
            break;
        }

        for command in commands {
            match command {
                SocketCommand::Dial { url } => match dial(&url).await {
                    Ok(ws) => {
                        *socket = Some(ws);
                        session.socket_opened(env.now());
                    },
                    Err(error) => {
                        tracing::warn!(%error, transient = error.is_transient(), "dial failed");
                        session.socket_closed(close_code::ABNORMAL, env.now());
                    },
                },
                SocketCommand::SendText(text) => {
                    if let Some(ws) = socket.as_mut() {
                        if let Err(error) = send_text(ws, text).await {
                            tracing::warn!(%error, "send failed, dropping socket");
                            *socket = None;
                            session.socket_closed(close_code::ABNORMAL, env.now());
                        }
                    } else {
                        tracing::warn!("send command without a live socket, dropping");
                    }
                },
                SocketCommand::Close { code } => {
                    if let Some(mut ws) = socket.take() {
                        let frame =
                            CloseFrame { code: CloseCode::from(code), reason: "".into() };
                        if let Err(error) = ws.close(Some(frame)).await {
                            tracing::debug!(%error, "close handshake failed");
                        }
                    }
                },
            }
        }
    }
}

async fn dial(url: &str) -> Result<WsStream, TransportError> {
    match connect_async(url).await {
        Ok((ws, _response)) => Ok(ws),
        Err(tungstenite::Error::Url(error)) => Err(TransportError::InvalidUrl(error.to_string())),
        Err(error) => Err(TransportError::Dial(error.to_string())),
    }
}

async fn send_text(ws: &mut WsStream, text: String) -> Result<(), TransportError> {
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|error| TransportError::Send(error.to_string()))
}

/// Resolve to the next socket event; pends forever while no socket is live,
/// so the select loop simply ignores this branch.
async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket.as_mut() {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

fn handle_socket_event<E, S>(
    env: &E,
    session: &mut S,
    socket: &mut Option<WsStream>,
    frame: Option<Result<Message, tungstenite::Error>>,
) where
    E: Environment,
    S: SocketDriven<E::Instant>,
{
    match frame {
        Some(Ok(Message::Text(text))) => session.handle_frame(text.as_str()),
        Some(Ok(Message::Close(frame))) => {
            let code = frame.map_or(close_code::ABNORMAL, |f| u16::from(f.code));
            *socket = None;
            session.socket_closed(code, env.now());
        },
        // Binary and ws-level ping/pong are not part of the protocol.
        Some(Ok(_)) => {},
        Some(Err(error)) => {
            tracing::warn!(%error, "socket error");
            *socket = None;
            session.socket_closed(close_code::ABNORMAL, env.now());
        },
        None => {
            *socket = None;
            session.socket_closed(close_code::ABNORMAL, env.now());
        },
    }
}
