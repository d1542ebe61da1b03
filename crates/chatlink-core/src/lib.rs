//! Connection state machine and derived state
//!
//! Sans-IO core of the chatlink transport. State machines here never touch a
//! socket or a timer: they take the current instant as input and return
//! actions for a driver to execute. This keeps every lifecycle rule (backoff,
//! heartbeats, typing decay) testable without sleeping.
//!
//! # Components
//!
//! - [`ChannelConnection`]: lifecycle state machine for one socket
//! - [`ReconnectPolicy`]: exponential backoff calculator
//! - [`ListenerRegistry`]: typed pub/sub table per event category
//! - [`TypingAggregator`]: time-decayed set of currently-typing users
//! - [`TypingDebounce`]: sender-side typing emission debounce
//! - [`env::Environment`]: time abstraction for production and tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod reconnect;
pub mod registry;
pub mod typing;

pub use connection::{
    ChannelConnection, ConnectionAction, ConnectionConfig, ConnectionState, close_code,
};
pub use env::Environment;
pub use reconnect::ReconnectPolicy;
pub use registry::{ListenerId, ListenerRegistry, ListenerSet, PresenceUpdate, ReactionUpdate};
pub use typing::{TypingAggregator, TypingDebounce, TypingEmission};
