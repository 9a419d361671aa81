//! Codec trait and implementations for frame bodies.
//!
//! STOMP carries an opaque body; the trivia broker puts JSON in it. The
//! dispatcher encodes outbound requests through a [`Codec`], so a different
//! body format only needs a new implementation here.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes request bodies and decodes reply bodies.
///
/// Lives inside the client's long-running tasks, hence the bounds.
pub trait Codec: Send + Sync + 'static {
    /// MIME type announced in the `content-type` header of every `SEND`.
    fn content_type(&self) -> &'static str;

    /// Serializes a body.
    ///
    /// # Errors
    /// `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes a body.
    ///
    /// # Errors
    /// `ProtocolError::Decode` if the bytes don't hold a `T`.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// The broker's body format. Behind the `json` feature (on by default).
///
/// ## Example
///
/// ```rust
/// use triviasync_protocol::{Codec, JsonCodec, RoomRequest};
///
/// let codec = JsonCodec;
/// let req = RoomRequest {
///     room_code: "ABCD".into(),
///     player_name: "Ann".into(),
/// };
///
/// assert_eq!(codec.content_type(), "application/json");
/// let bytes = codec.encode(&req).unwrap();
/// assert_eq!(bytes, br#"{"roomCode":"ABCD","playerName":"Ann"}"#);
///
/// let decoded: RoomRequest = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, req);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

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
