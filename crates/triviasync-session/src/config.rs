//! Session tuning.

use serde::{Deserialize, Serialize};

/// Per-session game constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds on the clock for each question.
    pub question_secs: u32,

    /// Questions per game; difficulty thresholds are fractions of this.
    pub total_questions: u32,

    /// Points for a correct answer before time bonus and multiplier.
    pub base_points: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            question_secs: 30,
            total_questions: 10,
            base_points: 10,
        }
    }
}
