//! Session facades and transport for the chatlink protocol.
//!
//! [`ChannelSession`] binds the sans-IO connection machine to one chat
//! channel; [`NotificationSession`] does the same for the per-user
//! notification stream. Both emit [`SocketCommand`]s for a driver to execute.
//!
//! With the `transport` feature enabled, [`transport::spawn_channel`] and
//! [`transport::spawn_notifications`] run a session on a tokio task over a
//! real WebSocket, exposing an ops/notices channel pair.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod session;
#[cfg(feature = "transport")]
pub mod transport;

pub use error::TransportError;
pub use session::{ChannelSession, EndpointConfig, NotificationSession, SocketCommand};
