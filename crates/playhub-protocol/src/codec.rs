//! Codec trait and the JSON implementation.
//!
//! The services never touch `serde_json` directly for framing; they go
//! through a [`Codec`] so the body format stays a single decision.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to message bodies and back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task of a service.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use playhub_protocol::{ClientRequest, Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(1, ClientRequest::ListRooms);
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope<ClientRequest> = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientRequest, Envelope};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Envelope<ClientRequest>, _> =
            JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_produces_plain_json() {
        let bytes = JsonCodec
            .encode(&Envelope::new(3, ClientRequest::Logout))
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["payload"]["action"], "logout");
    }
}
