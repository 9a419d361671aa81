//! Narrow interfaces to the services around the core.
//!
//! The broker owns questions and scoring; these traits describe the two
//! HTTP-side services the trivia deployment also exposes. The core only ever
//! calls [`ScoreService::update_score`], fire-and-forget, after a locally
//! scored correct answer. [`QuestionService`] is here so the code that hosts
//! the core (a bot, a single-player mode) can plug in a question source
//! through the same types.

use std::future::Future;

use serde::{Deserialize, Serialize};
use triviasync_protocol::Question;
use triviasync_session::Difficulty;

/// Errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The service could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with an error.
    #[error("request failed: {0}")]
    Failed(String),
}

/// One row of the global high-score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScore {
    #[serde(alias = "username")]
    pub player_name: String,
    pub score: u32,
}

/// Source of questions and answer verdicts.
pub trait QuestionService: Send + Sync + 'static {
    /// Fetches the next question at the given difficulty.
    fn next_question(
        &self,
        difficulty: Difficulty,
    ) -> impl Future<Output = Result<Question, ServiceError>> + Send;

    /// Returns whether `answer` is correct for question `question_id`.
    fn check_answer(
        &self,
        question_id: u64,
        answer: &str,
    ) -> impl Future<Output = Result<bool, ServiceError>> + Send;
}

/// Persistent score table.
pub trait ScoreService: Send + Sync + 'static {
    /// Adds `points` to a player's stored total.
    fn update_score(
        &self,
        player_name: &str,
        points: u32,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// The table, highest first.
    fn high_scores(
        &self,
    ) -> impl Future<Output = Result<Vec<HighScore>, ServiceError>> + Send;
}

/// A [`ScoreService`] that stores nothing. The client default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScoreService;

impl ScoreService for NullScoreService {
    async fn update_score(
        &self,
        _player_name: &str,
        _points: u32,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn high_scores(&self) -> Result<Vec<HighScore>, ServiceError> {
        Ok(Vec::new())
    }
}
