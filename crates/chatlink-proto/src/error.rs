//! Protocol error types.
//!
//! A malformed frame is an error at this layer only; the connection owner
//! logs and drops it without tearing the socket down. A single bad frame must
//! never take the connection with it.

use thiserror::Error;

/// Errors produced while decoding or encoding wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame was not valid JSON, or a known payload failed to deserialize.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame was valid JSON but carried no `type` discriminant.
    #[error("frame missing type discriminant")]
    MissingType,
}

impl ProtocolError {
    /// True if this error indicates a structurally broken frame (as opposed
    /// to a frame we simply do not understand, which is not an error at all).
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::MissingType)
    }
}
