//! Game session state machine for triviasync.
//!
//! Everything in this crate is synchronous and deterministic. A [`Session`]
//! is the client's view of one room; it changes only by folding [`Input`]s
//! through [`reduce`] (or [`Session::apply`]). Inputs are either broker
//! events ([`DomainEvent`](triviasync_protocol::DomainEvent)) or things the
//! local player did ([`LocalIntent`]).
//!
//! # State machine
//!
//! ```text
//!             GameStarted / Start(host)        TimeUp / Tick→0
//!   Waiting ───────────────────────────→ Playing ─────────────→ AnswerReview
//!      ↑                                  │  ↑ NewQuestion            │
//!      │ PlayAgain(host)                  │  └────────────────────────┘
//!      │                         GameOver │            GameOver │
//!   Finished ←────────────────────────────┴─────────────────────┘
//! ```
//!
//! Every transition is total: an input that doesn't apply in the current
//! state leaves the session unchanged. Delivery is at-least-once and unordered
//! across topics, so duplicates and stragglers are normal, not errors.

mod config;
mod reducer;
mod scoring;
mod session;

pub use config::SessionConfig;
pub use reducer::{reduce, Input, LocalIntent};
pub use scoring::{escalate, points};
pub use session::{Difficulty, GameState, Session};
