//! Property-based tests for the wire codec.
//!
//! Verifies the bilingual decoding contract for ALL inputs, not just
//! examples: any payload delivered in either naming convention must decode to
//! the identical internal representation, and arbitrary text must never make
//! `decode` panic.

use chatlink_proto::{InboundEvent, decode};
use proptest::prelude::*;
use serde_json::json;

/// Strategy for strings that are safe to embed in JSON values.
fn field_string() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _-]{0,32}"
}

#[test]
fn prop_typing_conventions_decode_identically() {
    proptest!(|(user_id in field_string(), user_name in field_string(), is_typing: bool)| {
        let snake = json!({
            "type": "typing",
            "user_id": user_id,
            "user_name": user_name,
            "is_typing": is_typing,
        });
        let camel = json!({
            "type": "typing",
            "userId": user_id,
            "userName": user_name,
            "isTyping": is_typing,
        });

        let from_snake = decode(&snake.to_string()).expect("snake decodes");
        let from_camel = decode(&camel.to_string()).expect("camel decodes");

        // PROPERTY: Both conventions are the same internal event.
        prop_assert_eq!(from_snake, from_camel);
    });
}

#[test]
fn prop_chat_message_conventions_decode_identically() {
    proptest!(|(
        id in field_string(),
        content in field_string(),
        sender_id in field_string(),
        sender_name in field_string(),
        sender_type in field_string(),
        reply_to in proptest::option::of(field_string()),
    )| {
        let mut snake = json!({
            "type": "chat_message",
            "id": id,
            "content": content,
            "sender_id": sender_id,
            "sender_name": sender_name,
            "sender_type": sender_type,
            "created_at": "2024-05-01T10:00:00Z",
        });
        let mut camel = json!({
            "type": "chat_message",
            "id": id,
            "content": content,
            "senderId": sender_id,
            "senderName": sender_name,
            "senderType": sender_type,
            "createdAt": "2024-05-01T10:00:00Z",
        });
        if let Some(reply_to) = reply_to {
            snake["reply_to_id"] = json!(reply_to);
            camel["replyToId"] = json!(reply_to);
        }

        let from_snake = decode(&snake.to_string()).expect("snake decodes");
        let from_camel = decode(&camel.to_string()).expect("camel decodes");

        prop_assert_eq!(from_snake, from_camel);
    });
}

/// Decode one frame in both conventions, assert they agree, and return the
/// shared event for variant checks.
fn decode_both(snake: &str, camel: &str) -> InboundEvent {
    let from_snake = decode(snake).expect("snake decodes").expect("known kind");
    let from_camel = decode(camel).expect("camel decodes").expect("known kind");
    assert_eq!(from_snake, from_camel, "conventions disagree for {snake}");
    from_snake
}

#[test]
fn every_inbound_kind_decodes_in_both_conventions() {
    assert!(matches!(
        decode_both(
            r#"{"type":"user_join","user_id":"u1","user_name":"Alice"}"#,
            r#"{"type":"user_join","userId":"u1","userName":"Alice"}"#,
        ),
        InboundEvent::UserJoin(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"user_leave","user_id":"u1","user_name":"Alice"}"#,
            r#"{"type":"user_leave","userId":"u1","userName":"Alice"}"#,
        ),
        InboundEvent::UserLeave(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"message_edited","message_id":"m1","content":"fixed"}"#,
            r#"{"type":"message_edited","messageId":"m1","content":"fixed"}"#,
        ),
        InboundEvent::MessageEdited(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"message_deleted","message_id":"m1"}"#,
            r#"{"type":"message_deleted","messageId":"m1"}"#,
        ),
        InboundEvent::MessageDeleted(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"thread_reply","id":"m2","content":"re","sender_id":"u1",
                "sender_name":"Alice","sender_type":"staff",
                "created_at":"2024-05-01T10:00:00Z","reply_to_id":"m1"}"#,
            r#"{"type":"thread_reply","id":"m2","content":"re","senderId":"u1",
                "senderName":"Alice","senderType":"staff",
                "createdAt":"2024-05-01T10:00:00Z","replyToId":"m1"}"#,
        ),
        InboundEvent::ThreadReply(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"reaction_added","message_id":"m1","user_id":"u1","emoji":"+1"}"#,
            r#"{"type":"reaction_added","messageId":"m1","userId":"u1","emoji":"+1"}"#,
        ),
        InboundEvent::ReactionAdded(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"reaction_removed","message_id":"m1","user_id":"u1","emoji":"+1"}"#,
            r#"{"type":"reaction_removed","messageId":"m1","userId":"u1","emoji":"+1"}"#,
        ),
        InboundEvent::ReactionRemoved(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"typing","user_id":"u1","user_name":"Alice","is_typing":true}"#,
            r#"{"type":"typing","userId":"u1","userName":"Alice","isTyping":true}"#,
        ),
        InboundEvent::Typing(_)
    ));
    assert!(matches!(
        decode_both(
            r#"{"type":"chat_message","id":"m1","content":"hi","sender_id":"u1",
                "sender_name":"Alice","sender_type":"guardian",
                "created_at":"2024-05-01T10:00:00Z"}"#,
            r#"{"type":"chat_message","id":"m1","content":"hi","senderId":"u1",
                "senderName":"Alice","senderType":"guardian",
                "createdAt":"2024-05-01T10:00:00Z"}"#,
        ),
        InboundEvent::ChatMessage(_)
    ));
}

#[test]
fn prop_unknown_discriminants_never_error() {
    proptest!(|(kind in "[a-z_]{1,24}")| {
        let known = [
            "chat_message",
            "typing",
            "user_join",
            "user_leave",
            "message_edited",
            "message_deleted",
            "thread_reply",
            "reaction_added",
            "reaction_removed",
            "pong",
        ];
        prop_assume!(!known.contains(&kind.as_str()));

        let frame = json!({ "type": kind, "anything": [1, 2, 3] }).to_string();

        // PROPERTY: Unknown kinds are dropped without error or dispatch.
        prop_assert_eq!(decode(&frame).expect("unknown kind is not an error"), None);
    });
}

#[test]
fn prop_decode_never_panics_on_arbitrary_text() {
    proptest!(|(text in ".{0,256}")| {
        // PROPERTY: Arbitrary input produces Ok or Err, never a panic.
        let _ = decode(&text);
    });
}

#[test]
fn prop_pong_decodes_regardless_of_extra_fields() {
    proptest!(|(extra in field_string())| {
        let frame = json!({ "type": "pong", "extra": extra }).to_string();
        prop_assert_eq!(decode(&frame).expect("pong decodes"), Some(InboundEvent::Pong));
    });
}
