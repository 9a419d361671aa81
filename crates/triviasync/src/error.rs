//! Unified error type for triviasync.

use triviasync_protocol::{DecodeError, ProtocolError};
use triviasync_transport::TransportError;

use crate::ServiceError;

/// Top-level error that wraps all crate-specific errors.
///
/// Most of these never reach a caller: the connection manager records them in
/// [`ConnectionState::last_error`](crate::ConnectionState) and the registry
/// logs decode failures. What does surface is [`TriviaError::Closed`], when a
/// [`ClientHandle`](crate::ClientHandle) outlives its client.
#[derive(Debug, thiserror::Error)]
pub enum TriviaError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A framing or body serialization error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An inbound body that couldn't be routed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An external service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The broker rejected or never answered the STOMP `CONNECT`.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The client task has stopped.
    #[error("client is shut down")]
    Closed,
}
