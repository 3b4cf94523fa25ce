//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
///
/// The variants deliberately separate "this frame is garbage" from "this
/// frame names an event we don't know": unknown events are logged and
/// ignored, never fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed — malformed JSON, missing required fields,
    /// or wrong data types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed as JSON but names an event this server does not
    /// recognize. Callers must log and ignore these, not close the
    /// connection.
    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    /// The frame decoded but violates a protocol rule — e.g. a second
    /// `hello` on an already-bound connection.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// `true` for frames that should be skipped without any reply.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::UnknownEvent(_))
    }
}
