//! Wire protocol for triviasync.
//!
//! This crate defines everything that crosses the socket between the trivia
//! client and the broker:
//!
//! - **Frames** ([`Frame`], [`Command`]): STOMP 1.2 text framing, including
//!   heartbeats and header escaping.
//! - **Addresses** ([`Topic`], [`Destination`]): the closed set of inbound
//!   topics and outbound destinations.
//! - **Messages** ([`PlayerInfo`], [`Question`], [`RoomRequest`],
//!   [`AnswerRequest`]): JSON bodies carried inside frames.
//! - **Events** ([`DomainEvent`]): the typed result of routing an inbound
//!   body, produced by [`route`].
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): body serialization.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Frame (STOMP) → route() → DomainEvent → session reducer
//! ```
//!
//! The protocol layer never touches sockets or session state.

mod codec;
mod error;
mod event;
mod frame;
#[cfg(feature = "json")]
mod router;
mod topic;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
#[cfg(feature = "json")]
pub use error::DecodeError;
pub use error::ProtocolError;
pub use event::{DomainEvent, MessageType, ScoreChange};
pub use frame::{
    negotiate_heartbeat, parse_heartbeat, Command, Decoded, Frame, HEARTBEAT,
};
#[cfg(feature = "json")]
pub use router::route;
pub use topic::{Destination, Topic};
pub use types::{AnswerRequest, PlayerInfo, Question, RoomRequest};
