//! Typed listener registry.
//!
//! One pub/sub table per event category. A registry is owned by exactly one
//! connection/session instance and is discarded with it, never reused, so a
//! stale handler can never receive events on behalf of a connection that no
//! longer represents the caller's intent.
//!
//! # Invariants
//!
//! - Dispatch order is registration order.
//! - A panicking handler is isolated; remaining handlers in the same dispatch
//!   still run.

use std::panic::{AssertUnwindSafe, catch_unwind};

use chatlink_proto::{
    ChatMessage, InboundEvent, MessageDelete, MessageEdit, PresenceEvent, ReactionEvent,
    TypingSignal,
};

use crate::connection::ConnectionState;

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A user joined or left, as seen by presence listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceUpdate {
    /// User joined the channel.
    Joined(PresenceEvent),
    /// User left the channel.
    Left(PresenceEvent),
}

/// A reaction change, as seen by reaction listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionUpdate {
    /// Reaction added to a message.
    Added(ReactionEvent),
    /// Reaction removed from a message.
    Removed(ReactionEvent),
}

type Handler<T> = Box<dyn FnMut(&T) + Send>;

/// Ordered set of handlers for one event category.
pub struct ListenerSet<T> {
    next_id: u64,
    handlers: Vec<(ListenerId, Handler<T>)>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self { next_id: 0, handlers: Vec::new() }
    }
}

impl<T> std::fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet").field("handlers", &self.handlers.len()).finish()
    }
}

impl<T> ListenerSet<T> {
    /// Register a handler; returns the id to unsubscribe with.
    pub fn subscribe(&mut self, handler: impl FnMut(&T) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if the id was already removed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every handler in registration order.
    ///
    /// A panicking handler is caught and logged; it does not abort dispatch
    /// to the remaining handlers or crash the connection.
    pub fn dispatch(&mut self, value: &T) {
        for (id, handler) in &mut self.handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                tracing::warn!(listener = id.0, "listener panicked during dispatch, isolated");
            }
        }
    }
}

/// Per-category listener tables for one connection instance.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    message: ListenerSet<ChatMessage>,
    typing: ListenerSet<TypingSignal>,
    presence: ListenerSet<PresenceUpdate>,
    status: ListenerSet<ConnectionState>,
    edit: ListenerSet<MessageEdit>,
    delete: ListenerSet<MessageDelete>,
    thread_reply: ListenerSet<ChatMessage>,
    reaction: ListenerSet<ReactionUpdate>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listeners for new chat messages.
    pub fn messages(&mut self) -> &mut ListenerSet<ChatMessage> {
        &mut self.message
    }

    /// Listeners for typing signals.
    pub fn typing(&mut self) -> &mut ListenerSet<TypingSignal> {
        &mut self.typing
    }

    /// Listeners for join/leave presence updates.
    pub fn presence(&mut self) -> &mut ListenerSet<PresenceUpdate> {
        &mut self.presence
    }

    /// Listeners for connection status changes.
    pub fn status(&mut self) -> &mut ListenerSet<ConnectionState> {
        &mut self.status
    }

    /// Listeners for message edits.
    pub fn edits(&mut self) -> &mut ListenerSet<MessageEdit> {
        &mut self.edit
    }

    /// Listeners for message deletions.
    pub fn deletes(&mut self) -> &mut ListenerSet<MessageDelete> {
        &mut self.delete
    }

    /// Listeners for thread replies.
    pub fn thread_replies(&mut self) -> &mut ListenerSet<ChatMessage> {
        &mut self.thread_reply
    }

    /// Listeners for reaction changes.
    pub fn reactions(&mut self) -> &mut ListenerSet<ReactionUpdate> {
        &mut self.reaction
    }

    /// Route one inbound event to its category's listeners.
    ///
    /// Pong is connection plumbing, not an application event; it reaches no
    /// category.
    pub fn dispatch_event(&mut self, event: &InboundEvent) {
        match event {
            InboundEvent::ChatMessage(msg) => self.message.dispatch(msg),
            InboundEvent::Typing(signal) => self.typing.dispatch(signal),
            InboundEvent::UserJoin(user) => {
                self.presence.dispatch(&PresenceUpdate::Joined(user.clone()));
            },
            InboundEvent::UserLeave(user) => {
                self.presence.dispatch(&PresenceUpdate::Left(user.clone()));
            },
            InboundEvent::MessageEdited(edit) => self.edit.dispatch(edit),
            InboundEvent::MessageDeleted(delete) => self.delete.dispatch(delete),
            InboundEvent::ThreadReply(msg) => self.thread_reply.dispatch(msg),
            InboundEvent::ReactionAdded(reaction) => {
                self.reaction.dispatch(&ReactionUpdate::Added(reaction.clone()));
            },
            InboundEvent::ReactionRemoved(reaction) => {
                self.reaction.dispatch(&ReactionUpdate::Removed(reaction.clone()));
            },
            InboundEvent::Pong => {},
        }
    }

    /// Notify status listeners of a state change.
    pub fn dispatch_status(&mut self, state: ConnectionState) {
        self.status.dispatch(&state);
    }
}
