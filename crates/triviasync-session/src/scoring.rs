//! Points and difficulty rules, in integer arithmetic.

use crate::Difficulty;

/// Points for a correct answer with `time_left` seconds remaining.
///
/// `floor((base + floor(time_left / 3)) * multiplier)` where the multiplier is
/// 1.0, 1.5 or 2.0. Multipliers are carried in halves so the result is exact.
///
/// ```rust
/// use triviasync_session::{points, Difficulty};
///
/// assert_eq!(points(30, Difficulty::Easy, 10), 20);
/// assert_eq!(points(29, Difficulty::Medium, 10), 28); // 19 * 1.5 = 28.5
/// assert_eq!(points(0, Difficulty::Hard, 10), 20);
/// ```
pub fn points(time_left: u32, difficulty: Difficulty, base: u32) -> u32 {
    let raw = u64::from(base) + u64::from(time_left / 3);
    let scaled = raw * u64::from(difficulty.multiplier_halves()) / 2;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Difficulty after `correct` right answers out of `total` questions.
///
/// More than 80% correct → Hard, more than half → Medium. Never lower than
/// `current`.
pub fn escalate(current: Difficulty, correct: u32, total: u32) -> Difficulty {
    let (correct, total) = (u64::from(correct), u64::from(total));
    let earned = if correct * 5 > total * 4 {
        Difficulty::Hard
    } else if correct * 2 > total {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    };
    current.max(earned)
}
