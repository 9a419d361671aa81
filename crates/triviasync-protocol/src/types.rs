//! JSON bodies carried inside STOMP frames.
//!
//! The broker speaks camelCase (`roomCode`, `playerName`, `isHost`), so every
//! type here uses `#[serde(rename_all = "camelCase")]`. Aliases accept the
//! older field names some broker builds still emit (`username`,
//! `questionText`, `possibleAnswers`).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound data
// ---------------------------------------------------------------------------

/// One entry of a room roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    #[serde(alias = "username")]
    pub name: String,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub is_host: bool,
}

impl PlayerInfo {
    /// A roster entry with zero score.
    pub fn new(name: impl Into<String>, is_host: bool) -> Self {
        Self {
            name: name.into(),
            score: 0,
            is_host,
        }
    }
}

/// A question as shown to players. Correctness is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(alias = "questionText")]
    pub text: String,
    #[serde(default, alias = "possibleAnswers")]
    pub answers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Outbound requests
// ---------------------------------------------------------------------------

/// Body of `create`, `join`, `start`, `timeup` and `leave`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRequest {
    pub room_code: String,
    pub player_name: String,
}

/// Body of `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub room_code: String,
    pub player_name: String,
    pub answer: String,
    /// Seconds left on the local countdown when the answer was given.
    pub time_remaining: u32,
}
