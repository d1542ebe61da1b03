//! Transport-level errors.
//!
//! The state machine layer is infallible (bad input is logged and dropped);
//! errors only arise where real sockets are involved. Failed dials and sends
//! are reported to the machine as abnormal closures, so these errors feed the
//! reconnect policy rather than aborting the driver.

/// Error from the WebSocket transport driver.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket URL could not be parsed; retrying cannot help.
    #[error("invalid socket url: {0}")]
    InvalidUrl(String),

    /// Opening the socket failed (DNS, TCP, TLS, or handshake).
    #[error("dial failed: {0}")]
    Dial(String),

    /// Sending a frame on the live socket failed.
    #[error("send failed: {0}")]
    Send(String),
}

impl TransportError {
    /// True if retrying the operation could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_))
    }
}
