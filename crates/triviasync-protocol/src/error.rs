//! Error types for the protocol layer.
//!
//! Two enums live here. [`ProtocolError`] covers framing and body
//! serialization; [`DecodeError`] is what the message router produces when an
//! inbound body can't be turned into a [`DomainEvent`](crate::DomainEvent).
//! Decode errors are expected in normal operation (newer brokers, typos) and
//! are logged and dropped by callers rather than propagated.

/// Errors that can occur while framing or (de)serializing.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The bytes are not a well-formed STOMP frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The frame is well-formed but violates the protocol, e.g. a
    /// `MESSAGE` without a `subscription` header.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Why an inbound body could not be routed to a domain event.
#[cfg(feature = "json")]
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The body is not JSON.
    #[error("malformed body: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The body has no string `type` discriminator.
    #[error("missing `type` discriminator")]
    MissingType,

    /// The `type` tag is not one this client understands.
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    /// The tag is known but its fields don't match.
    #[error("invalid fields for {tag}: {source}")]
    InvalidFields {
        tag: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A required field is absent.
    #[error("{tag} is missing `{field}`")]
    MissingField {
        tag: &'static str,
        field: &'static str,
    },

    /// A player-scoped message arrived but no local identity is known.
    #[error("{tag} on a player-scoped topic needs a player identity")]
    MissingIdentity { tag: &'static str },
}
