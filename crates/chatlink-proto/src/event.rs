//! Typed event model.
//!
//! These are the payload types the rest of the client works with. They are
//! constructed by the codec from one raw frame, dispatched to listeners, and
//! discarded; the transport retains none of them.

use serde::{Deserialize, Serialize};

/// One unit of conversation content.
///
/// Created by the backend and observed by the client; outbound messages are
/// represented by [`OutboundIntent::ChatMessage`] and are not cached by the
/// transport.
///
/// Inbound fields accept both naming conventions (e.g. `sender_id` and
/// `senderId`); serialization always emits snake_case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Backend-assigned message ID.
    pub id: String,

    /// Message body.
    pub content: String,

    /// Stable sender ID.
    #[serde(alias = "senderId")]
    pub sender_id: String,

    /// Display name of the sender.
    #[serde(alias = "senderName")]
    pub sender_name: String,

    /// Sender role (e.g. "guardian", "staff").
    #[serde(alias = "senderType")]
    pub sender_type: String,

    /// Creation timestamp as reported by the backend (RFC 3339).
    #[serde(alias = "createdAt")]
    pub created_at: String,

    /// ID of the message this one replies to, if any.
    #[serde(default, alias = "replyToId", skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

/// A point-in-time assertion that a user is or is not typing.
///
/// Raw event; fed into the typing aggregator, not retained by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingSignal {
    /// Stable user ID.
    #[serde(alias = "userId")]
    pub user_id: String,

    /// Display name of the user.
    #[serde(alias = "userName")]
    pub user_name: String,

    /// True while the user is composing.
    #[serde(alias = "isTyping")]
    pub is_typing: bool,
}

/// A user joined or left the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    /// Stable user ID.
    #[serde(alias = "userId")]
    pub user_id: String,

    /// Display name of the user.
    #[serde(alias = "userName")]
    pub user_name: String,
}

/// An existing message was edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEdit {
    /// ID of the edited message.
    #[serde(alias = "messageId")]
    pub message_id: String,

    /// New message body.
    pub content: String,
}

/// An existing message was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelete {
    /// ID of the deleted message.
    #[serde(alias = "messageId")]
    pub message_id: String,
}

/// A reaction was added to or removed from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// ID of the message reacted to.
    #[serde(alias = "messageId")]
    pub message_id: String,

    /// User who reacted.
    #[serde(alias = "userId")]
    pub user_id: String,

    /// Reaction content (e.g. emoji).
    pub emoji: String,
}

/// A normalized, strongly-typed representation of one inbound wire frame.
///
/// Constructed by [`crate::decode`] and immediately dispatched; unknown frame
/// kinds never reach this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// New chat message delivered.
    ChatMessage(ChatMessage),
    /// Typing state changed for a user.
    Typing(TypingSignal),
    /// A user joined the channel.
    UserJoin(PresenceEvent),
    /// A user left the channel.
    UserLeave(PresenceEvent),
    /// A message was edited.
    MessageEdited(MessageEdit),
    /// A message was deleted.
    MessageDeleted(MessageDelete),
    /// A reply arrived in a message thread.
    ThreadReply(ChatMessage),
    /// A reaction was added.
    ReactionAdded(ReactionEvent),
    /// A reaction was removed.
    ReactionRemoved(ReactionEvent),
    /// Heartbeat acknowledgment. Counts as inbound activity only; the socket
    /// close event remains the authoritative liveness signal.
    Pong,
}

/// A typed outbound intent, encoded by [`crate::encode`] into exactly one
/// wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundIntent {
    /// Send a chat message.
    ChatMessage {
        /// Message body.
        content: String,
        /// Message being replied to, if any.
        reply_to_id: Option<String>,
    },
    /// Announce local typing state.
    Typing {
        /// True while composing.
        is_typing: bool,
    },
    /// Mark a message as read.
    MarkRead {
        /// Message to mark.
        message_id: String,
    },
    /// Heartbeat keep-alive, no payload.
    Ping,
}
