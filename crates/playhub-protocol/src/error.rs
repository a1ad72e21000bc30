//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields or wrong
    /// types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
