//! Typed inbound events.
//!
//! [`DomainEvent`] is a closed enum: adding a broker message type means adding
//! a variant here, and every `match` in the reducer stops compiling until it
//! handles it.

use crate::{PlayerInfo, Question};

/// How a `SCORE_UPDATE` changes a player's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreChange {
    /// Replace the score (`score` field). Re-applying is harmless.
    Absolute(u32),
    /// Add to the score (`points` field). Re-applying double-counts.
    Delta(u32),
}

impl ScoreChange {
    /// Applies the change to a current score.
    pub fn apply(self, current: u32) -> u32 {
        match self {
            Self::Absolute(score) => score,
            Self::Delta(points) => current.saturating_add(points),
        }
    }
}

/// An event decoded from the broker, ready for the session reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// The room roster as the broker sees it now.
    PlayerJoined { players: Vec<PlayerInfo> },
    /// One player left the room.
    PlayerLeft { player_name: String },
    GameStarted,
    NewQuestion { question: Question },
    /// A player answered. `correct`/`points` are present only when the
    /// broker judges answers itself.
    AnswerSubmitted {
        player_name: String,
        correct: Option<bool>,
        points: Option<u32>,
    },
    TimeUp,
    ScoreUpdate {
        player_name: String,
        change: ScoreChange,
    },
    /// Final standings; may be empty if the broker doesn't send them.
    GameOver { leaderboard: Vec<PlayerInfo> },
    /// A broker-reported application error (room full, bad code, ...).
    Error { message: String },
}

/// The `type` tags the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    PlayerJoined,
    PlayerLeft,
    GameStarted,
    NewQuestion,
    AnswerSubmitted,
    TimeUp,
    ScoreUpdate,
    GameOver,
    Error,
    RoomFull,
    InvalidRoom,
}

impl MessageType {
    /// Looks up a wire tag. `GAME_ENDED` is accepted for `GAME_OVER`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "PLAYER_JOINED" => Self::PlayerJoined,
            "PLAYER_LEFT" => Self::PlayerLeft,
            "GAME_STARTED" => Self::GameStarted,
            "NEW_QUESTION" => Self::NewQuestion,
            "ANSWER_SUBMITTED" => Self::AnswerSubmitted,
            "TIME_UP" => Self::TimeUp,
            "SCORE_UPDATE" => Self::ScoreUpdate,
            "GAME_OVER" | "GAME_ENDED" => Self::GameOver,
            "ERROR" => Self::Error,
            "ROOM_FULL" => Self::RoomFull,
            "INVALID_ROOM" => Self::InvalidRoom,
            _ => return None,
        })
    }

    /// The canonical wire tag.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::PlayerJoined => "PLAYER_JOINED",
            Self::PlayerLeft => "PLAYER_LEFT",
            Self::GameStarted => "GAME_STARTED",
            Self::NewQuestion => "NEW_QUESTION",
            Self::AnswerSubmitted => "ANSWER_SUBMITTED",
            Self::TimeUp => "TIME_UP",
            Self::ScoreUpdate => "SCORE_UPDATE",
            Self::GameOver => "GAME_OVER",
            Self::Error => "ERROR",
            Self::RoomFull => "ROOM_FULL",
            Self::InvalidRoom => "INVALID_ROOM",
        }
    }
}
