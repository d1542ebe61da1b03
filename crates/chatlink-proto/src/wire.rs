//! JSON wire envelope encoding and decoding.
//!
//! The envelope is internally tagged: `{"type": "chat_message", ...payload}`.
//! The discriminant is routed in one place here; payload field-name duality
//! (snake_case/camelCase) is handled by serde aliases on the payload types,
//! not per event kind.
//!
//! # Invariants
//!
//! - One raw frame produces at most one [`InboundEvent`].
//! - An unrecognized discriminant is `Ok(None)`, never an error.
//! - Encoding always emits the wire-side snake_case convention.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{
    error::ProtocolError,
    event::{InboundEvent, OutboundIntent},
};

/// Decode one raw text frame into a typed inbound event.
///
/// Returns `Ok(None)` for frames whose discriminant is unrecognized, so that
/// newer backend event kinds pass through harmlessly.
///
/// # Errors
///
/// - [`ProtocolError::Malformed`] if the frame is not valid JSON or a known
///   payload fails to deserialize
/// - [`ProtocolError::MissingType`] if the envelope has no `type` field
pub fn decode(text: &str) -> Result<Option<InboundEvent>, ProtocolError> {
    let envelope: Value = serde_json::from_str(text)?;

    let Some(kind) = envelope.get("type").and_then(Value::as_str) else {
        return Err(ProtocolError::MissingType);
    };

    let event = match kind {
        "chat_message" => InboundEvent::ChatMessage(payload(envelope)?),
        "typing" => InboundEvent::Typing(payload(envelope)?),
        "user_join" => InboundEvent::UserJoin(payload(envelope)?),
        "user_leave" => InboundEvent::UserLeave(payload(envelope)?),
        "message_edited" => InboundEvent::MessageEdited(payload(envelope)?),
        "message_deleted" => InboundEvent::MessageDeleted(payload(envelope)?),
        "thread_reply" => InboundEvent::ThreadReply(payload(envelope)?),
        "reaction_added" => InboundEvent::ReactionAdded(payload(envelope)?),
        "reaction_removed" => InboundEvent::ReactionRemoved(payload(envelope)?),
        "pong" => InboundEvent::Pong,
        _ => return Ok(None),
    };

    Ok(Some(event))
}

/// Encode a typed outbound intent into one raw text frame.
pub fn encode(intent: &OutboundIntent) -> String {
    let envelope = match intent {
        OutboundIntent::ChatMessage { content, reply_to_id } => match reply_to_id {
            Some(reply_to_id) => json!({
                "type": "chat_message",
                "content": content,
                "reply_to_id": reply_to_id,
            }),
            None => json!({ "type": "chat_message", "content": content }),
        },
        OutboundIntent::Typing { is_typing } => {
            json!({ "type": "typing", "is_typing": is_typing })
        },
        OutboundIntent::MarkRead { message_id } => {
            json!({ "type": "mark_read", "message_id": message_id })
        },
        OutboundIntent::Ping => json!({ "type": "ping" }),
    };

    envelope.to_string()
}

/// Deserialize the envelope into a concrete payload type.
///
/// The stray `type` field is ignored by serde's default unknown-field
/// handling, so payload structs need no envelope wrapper.
fn payload<T: DeserializeOwned>(envelope: Value) -> Result<T, ProtocolError> {
    Ok(serde_json::from_value(envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChatMessage, TypingSignal};

    #[test]
    fn decode_chat_message_snake_case() {
        let text = r#"{
            "type": "chat_message",
            "id": "m1",
            "content": "hello",
            "sender_id": "u1",
            "sender_name": "Alice",
            "sender_type": "guardian",
            "created_at": "2024-05-01T10:00:00Z"
        }"#;

        let event = decode(text).unwrap().unwrap();
        match event {
            InboundEvent::ChatMessage(msg) => {
                assert_eq!(msg.id, "m1");
                assert_eq!(msg.content, "hello");
                assert_eq!(msg.sender_type, "guardian");
                assert_eq!(msg.reply_to_id, None);
            },
            other => panic!("expected ChatMessage, got {other:?}"),
        }
    }

    #[test]
    fn decode_chat_message_camel_case() {
        let text = r#"{
            "type": "chat_message",
            "id": "m1",
            "content": "hello",
            "senderId": "u1",
            "senderName": "Alice",
            "senderType": "guardian",
            "createdAt": "2024-05-01T10:00:00Z",
            "replyToId": "m0"
        }"#;

        let event = decode(text).unwrap().unwrap();
        match event {
            InboundEvent::ChatMessage(msg) => {
                assert_eq!(msg.sender_id, "u1");
                assert_eq!(msg.reply_to_id.as_deref(), Some("m0"));
            },
            other => panic!("expected ChatMessage, got {other:?}"),
        }
    }

    #[test]
    fn both_conventions_decode_identically() {
        let snake = r#"{"type":"typing","user_id":"u1","user_name":"Alice","is_typing":true}"#;
        let camel = r#"{"type":"typing","userId":"u1","userName":"Alice","isTyping":true}"#;

        assert_eq!(decode(snake).unwrap(), decode(camel).unwrap());
    }

    #[test]
    fn unknown_discriminant_is_silently_ignored() {
        let text = r#"{"type":"server_maintenance","at":"soon"}"#;
        assert_eq!(decode(text).unwrap(), None);
    }

    #[test]
    fn malformed_frame_is_an_error() {
        assert!(decode("{not json").is_err());
        assert!(decode(r#"{"no_type": true}"#).is_err());
        // Known discriminant with missing required fields is malformed too.
        assert!(decode(r#"{"type":"chat_message"}"#).is_err());
    }

    #[test]
    fn encode_ping_has_no_payload() {
        assert_eq!(encode(&OutboundIntent::Ping), r#"{"type":"ping"}"#);
    }

    #[test]
    fn encode_uses_wire_convention() {
        let text = encode(&OutboundIntent::ChatMessage {
            content: "hi".to_string(),
            reply_to_id: Some("m0".to_string()),
        });
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "chat_message");
        assert_eq!(value["reply_to_id"], "m0");
        assert!(value.get("replyToId").is_none());
    }

    #[test]
    fn encode_omits_absent_reply_to() {
        let text = encode(&OutboundIntent::ChatMessage {
            content: "hi".to_string(),
            reply_to_id: None,
        });
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("reply_to_id").is_none());
    }

    #[test]
    fn serialized_events_round_trip() {
        let msg = ChatMessage {
            id: "m1".to_string(),
            content: "hello".to_string(),
            sender_id: "u1".to_string(),
            sender_name: "Alice".to_string(),
            sender_type: "staff".to_string(),
            created_at: "2024-05-01T10:00:00Z".to_string(),
            reply_to_id: None,
        };

        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: ChatMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);

        let signal = TypingSignal {
            user_id: "u1".to_string(),
            user_name: "Alice".to_string(),
            is_typing: false,
        };
        let encoded = serde_json::to_string(&signal).unwrap();
        let decoded: TypingSignal = serde_json::from_str(&encoded).unwrap();
        assert_eq!(signal, decoded);
    }
}
