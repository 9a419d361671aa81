//! Session types: the client's view of one room.
//!
//! A session exists from the moment the player issues a create/join intent
//! until they leave the room. It records:
//! - WHO the player is and whether they host the room
//! - WHERE the game is (`GameState`, current question, clock)
//! - HOW they are doing (score, correct answers, difficulty)
//! - WHAT the UI should show (roster, leaderboard, last broker error)

use std::fmt;

use triviasync_protocol::{PlayerInfo, Question};

use crate::SessionConfig;

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Where the room's game currently is.
///
/// ```text
/// Waiting → Playing ⇄ AnswerReview → Finished → Waiting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    Waiting,
    Playing,
    AnswerReview,
    Finished,
}

impl GameState {
    /// Returns `true` while a game is running (`Playing` or `AnswerReview`).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::AnswerReview)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Waiting => "WAITING",
            Self::Playing => "PLAYING",
            Self::AnswerReview => "ANSWER_REVIEW",
            Self::Finished => "FINISHED",
        })
    }
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Question difficulty. Ordered, so escalation is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Score multiplier in halves: 2 (×1.0), 3 (×1.5), 4 (×2.0).
    pub fn multiplier_halves(self) -> u32 {
        match self {
            Self::Easy => 2,
            Self::Medium => 3,
            Self::Hard => 4,
        }
    }

    /// Lower-case name, as the question service expects it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One player's view of one room.
///
/// Fields are public for rendering; mutate only through
/// [`Session::apply`](crate::Session::apply) or [`reduce`](crate::reduce).
///
/// Invariants kept by the reducer:
/// - `current_question` is `Some` only while `game_state == Playing`;
/// - `players` is non-empty whenever `game_state != Waiting`;
/// - names in `players` are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room_code: String,
    pub player_name: String,
    pub is_host: bool,
    pub players: Vec<PlayerInfo>,
    pub game_state: GameState,
    pub current_question: Option<Question>,
    /// Id of the most recent question shown in this game. Survives `TimeUp`
    /// so a redelivered question can be recognised after review starts.
    pub last_question_id: Option<u64>,
    /// Seconds left on the current question.
    pub time_left: u32,
    pub score: u32,
    pub correct_answers: u32,
    /// Questions seen in this game.
    pub questions_asked: u32,
    pub difficulty: Difficulty,
    /// The answer the player picked for the current question, if any.
    pub submitted_answer: Option<String>,
    /// Verdict on the current question once it's known.
    pub last_answer_correct: Option<bool>,
    /// Whether the current question has been resolved (scored) already.
    pub answered: bool,
    /// Final standings, filled on `GameOver`.
    pub leaderboard: Vec<PlayerInfo>,
    pub last_error: Option<String>,
    /// Bumped on every broker error so a delayed clear can't wipe a newer one.
    pub error_seq: u64,
    pub config: SessionConfig,
}

impl Session {
    /// A session for a room this player is creating (and therefore hosts).
    pub fn create(
        room_code: impl Into<String>,
        player_name: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self::new(room_code.into(), player_name.into(), true, config)
    }

    /// A session for an existing room this player is joining.
    pub fn join(
        room_code: impl Into<String>,
        player_name: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self::new(room_code.into(), player_name.into(), false, config)
    }

    fn new(
        room_code: String,
        player_name: String,
        is_host: bool,
        config: SessionConfig,
    ) -> Self {
        Self {
            room_code,
            player_name,
            is_host,
            players: Vec::new(),
            game_state: GameState::Waiting,
            current_question: None,
            last_question_id: None,
            time_left: config.question_secs,
            score: 0,
            correct_answers: 0,
            questions_asked: 0,
            difficulty: Difficulty::Easy,
            submitted_answer: None,
            last_answer_correct: None,
            answered: false,
            leaderboard: Vec::new(),
            last_error: None,
            error_seq: 0,
            config,
        }
    }

    /// Looks up a roster entry by name.
    pub fn player(&self, name: &str) -> Option<&PlayerInfo> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Returns `true` if the countdown should be running.
    pub fn clock_running(&self) -> bool {
        self.game_state == GameState::Playing
            && self.current_question.is_some()
            && self.time_left > 0
    }
}
