//! # triviasync
//!
//! Session synchronization core for real-time multiplayer trivia clients.
//!
//! A client keeps one resilient STOMP-over-WebSocket connection to the trivia
//! broker, subscribes to the topics of the room the player is in, routes
//! every inbound message to a typed event, and folds those events together
//! with the player's own intents into a deterministic [`Session`].
//!
//! The pieces, bottom-up:
//!
//! - [`ConnectionManager`]: dial, handshake, heartbeats, bounded reconnect.
//! - [`SubscriptionRegistry`]: topic → handlers, resubscribed per connection
//!   generation.
//! - [`route`](triviasync_protocol::route): body → [`DomainEvent`].
//! - [`reduce`](triviasync_session::reduce): `(Session, Input) → Session`.
//! - [`IntentDispatcher`]: intent → STOMP `SEND`.
//!
//! [`TriviaClient`] wires them into a single dispatch loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use triviasync::prelude::*;
//!
//! # async fn run() -> Result<(), TriviaError> {
//! let client = TriviaClient::builder()
//!     .url("ws://localhost:8080/ws")
//!     .build();
//!
//! let mut connectivity = client.connectivity();
//! connectivity.wait_for(|c| c.is_connected() || c.terminal).await.ok();
//!
//! client.create_room("ABCD", "Ann").await?;
//! let mut session = client.session();
//! session.changed().await.ok();
//! # Ok(())
//! # }
//! ```
//!
//! [`Session`]: triviasync_session::Session
//! [`DomainEvent`]: triviasync_protocol::DomainEvent

mod client;
mod config;
mod connection;
mod dispatcher;
mod error;
mod registry;
mod services;

pub use client::{ClientBuilder, ClientHandle, TriviaClient};
pub use config::{ClientConfig, DEFAULT_URL};
pub use connection::{
    ConnectionHandle, ConnectionManager, ConnectionState, ConnectionStatus,
    TransportEvent,
};
pub use dispatcher::IntentDispatcher;
pub use error::TriviaError;
pub use registry::{handler, Handler, Subscription, SubscriptionRegistry};
pub use services::{
    HighScore, NullScoreService, QuestionService, ScoreService, ServiceError,
};

/// Convenience re-exports for users of the client.
pub mod prelude {
    pub use crate::{
        handler, ClientBuilder, ClientConfig, ClientHandle, ConnectionState,
        ConnectionStatus, Handler, HighScore, QuestionService, ScoreService,
        ServiceError, Subscription, TriviaClient, TriviaError,
    };
    pub use triviasync_protocol::{DomainEvent, PlayerInfo, Question, ScoreChange, Topic};
    pub use triviasync_session::{
        Difficulty, GameState, LocalIntent, Session, SessionConfig,
    };
}
