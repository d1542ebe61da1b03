//! Wire protocol codec
//!
//! Converts between the on-wire JSON event envelope and a strongly-typed
//! internal event model. The codec is stateless: one raw text frame maps to at
//! most one [`InboundEvent`], and one [`OutboundIntent`] maps to exactly one
//! raw text frame.
//!
//! # Compatibility
//!
//! The backend passes payloads through a case-converting layer, so inbound
//! fields may arrive in either snake_case or camelCase. Both spellings decode
//! to the same internal representation (see [`wire`]). Outbound frames always
//! use the wire-side snake_case convention.
//!
//! Unknown event discriminants decode to `Ok(None)` rather than an error, so
//! newer backends can introduce event kinds without breaking older clients.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod event;
pub mod wire;

pub use error::ProtocolError;
pub use event::{
    ChatMessage, InboundEvent, MessageDelete, MessageEdit, OutboundIntent, PresenceEvent,
    ReactionEvent, TypingSignal,
};
pub use wire::{decode, encode};
