//! The reducer: `(Session, Input) → Session`.

use std::collections::HashSet;

use triviasync_protocol::{DomainEvent, PlayerInfo, Question};
use tracing::{debug, trace, warn};

use crate::{escalate, points, GameState, Session};

/// Something the local player did, not yet confirmed by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalIntent {
    /// Host pressed start and the `start` message went out.
    Start,
    /// The player picked an answer for the current question.
    SubmitAnswer { answer: String },
    /// A client-side verdict on the current question.
    ResolveAnswer { correct: bool },
    /// One second of the local countdown elapsed.
    Tick,
    /// The local countdown ran out.
    TimeUp,
    /// Host wants a new game in the same room.
    PlayAgain,
    /// The error display interval for error `seq` elapsed.
    ClearError { seq: u64 },
}

/// Anything the reducer consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Event(DomainEvent),
    Local(LocalIntent),
}

impl From<DomainEvent> for Input {
    fn from(event: DomainEvent) -> Self {
        Self::Event(event)
    }
}

impl From<LocalIntent> for Input {
    fn from(intent: LocalIntent) -> Self {
        Self::Local(intent)
    }
}

/// Folds one input into a session and returns the result.
///
/// Never fails. Inputs that don't apply return the session unchanged.
///
/// ```rust
/// use triviasync_protocol::DomainEvent;
/// use triviasync_session::{reduce, GameState, Session, SessionConfig};
///
/// let session = Session::join("ABCD", "Ann", SessionConfig::default());
/// let session = reduce(session, DomainEvent::GameStarted.into());
/// assert_eq!(session.game_state, GameState::Playing);
/// ```
pub fn reduce(mut session: Session, input: Input) -> Session {
    session.apply(input);
    session
}

impl Session {
    /// In-place form of [`reduce`].
    pub fn apply(&mut self, input: impl Into<Input>) {
        match input.into() {
            Input::Event(event) => self.on_event(event),
            Input::Local(intent) => self.on_intent(intent),
        }
    }

    fn on_event(&mut self, event: DomainEvent) {
        match event {
            DomainEvent::PlayerJoined { players } => {
                if self.game_state == GameState::Finished {
                    trace!(room = %self.room_code, "roster update after game over ignored");
                    return;
                }
                self.merge_roster(players);
            }
            DomainEvent::PlayerLeft { player_name } => {
                if self.game_state == GameState::Finished {
                    return;
                }
                self.remove_player(&player_name);
            }
            DomainEvent::GameStarted => {
                if self.game_state == GameState::Waiting {
                    self.start_game();
                }
            }
            DomainEvent::NewQuestion { question } => {
                if !self.game_state.is_active() {
                    debug!(state = %self.game_state, "question outside a running game ignored");
                    return;
                }
                if self.is_repeat(&question) {
                    debug!(room = %self.room_code, "question redelivered, ignored");
                    return;
                }
                self.game_state = GameState::Playing;
                self.last_question_id = question.id;
                self.current_question = Some(question);
                self.time_left = self.config.question_secs;
                self.questions_asked += 1;
                self.answered = false;
                self.submitted_answer = None;
                self.last_answer_correct = None;
            }
            DomainEvent::AnswerSubmitted {
                player_name,
                correct,
                points,
            } => match correct {
                Some(correct) if player_name == self.player_name => {
                    self.resolve(correct, points);
                }
                _ => trace!(%player_name, "answer submitted"),
            },
            DomainEvent::TimeUp => self.time_up(),
            DomainEvent::ScoreUpdate {
                player_name,
                change,
            } => {
                let is_self = player_name == self.player_name;
                let entry = self.players.iter_mut().find(|p| p.name == player_name);
                match entry {
                    Some(entry) => entry.score = change.apply(entry.score),
                    None if is_self => {}
                    None => {
                        warn!(%player_name, room = %self.room_code, "score update for unknown player ignored");
                        return;
                    }
                }
                if is_self {
                    self.score = change.apply(self.score);
                }
            }
            DomainEvent::GameOver { leaderboard } => {
                if !self.game_state.is_active() {
                    return;
                }
                let mut standings = if leaderboard.is_empty() {
                    self.players.clone()
                } else {
                    dedup_by_name(leaderboard)
                };
                standings.sort_by(|a, b| b.score.cmp(&a.score));
                self.leaderboard = standings;
                self.game_state = GameState::Finished;
                self.current_question = None;
                self.time_left = 0;
            }
            DomainEvent::Error { message } => {
                self.error_seq += 1;
                self.last_error = Some(message);
            }
        }
    }

    fn on_intent(&mut self, intent: LocalIntent) {
        match intent {
            LocalIntent::Start => {
                if self.is_host && self.game_state == GameState::Waiting {
                    self.start_game();
                }
            }
            LocalIntent::SubmitAnswer { answer } => {
                if self.game_state == GameState::Playing
                    && self.current_question.is_some()
                    && !self.answered
                    && self.submitted_answer.is_none()
                {
                    self.submitted_answer = Some(answer);
                }
            }
            LocalIntent::ResolveAnswer { correct } => self.resolve(correct, None),
            LocalIntent::Tick => {
                if self.clock_running() {
                    self.time_left -= 1;
                    if self.time_left == 0 {
                        self.time_up();
                    }
                }
            }
            LocalIntent::TimeUp => self.time_up(),
            LocalIntent::PlayAgain => {
                if self.is_host && self.game_state == GameState::Finished {
                    self.reset_game();
                }
            }
            LocalIntent::ClearError { seq } => {
                if seq == self.error_seq {
                    self.last_error = None;
                }
            }
        }
    }

    // -- transitions --------------------------------------------------------

    fn start_game(&mut self) {
        self.game_state = GameState::Playing;
        self.time_left = self.config.question_secs;
        self.current_question = None;
        self.last_question_id = None;
        self.answered = false;
        self.submitted_answer = None;
        self.last_answer_correct = None;
        self.leaderboard.clear();
        if self.players.is_empty() {
            self.players
                .push(PlayerInfo::new(self.player_name.clone(), self.is_host));
        }
        debug!(room = %self.room_code, "game started");
    }

    /// Whether `question` is the one already shown. Questions without an id
    /// only match while they are still on screen.
    fn is_repeat(&self, question: &Question) -> bool {
        match question.id {
            Some(id) => self.last_question_id == Some(id),
            None => self.current_question.as_ref() == Some(question),
        }
    }

    fn time_up(&mut self) {
        if self.game_state != GameState::Playing {
            return;
        }
        self.game_state = GameState::AnswerReview;
        self.current_question = None;
        self.time_left = 0;
    }

    /// Scores the current question once. Later verdicts for the same
    /// question, or verdicts after the clock ran out, are no-ops.
    fn resolve(&mut self, correct: bool, awarded: Option<u32>) {
        if self.game_state != GameState::Playing
            || self.current_question.is_none()
            || self.answered
        {
            return;
        }
        self.answered = true;
        self.last_answer_correct = Some(correct);
        if !correct {
            return;
        }

        let earned = awarded.unwrap_or_else(|| {
            points(self.time_left, self.difficulty, self.config.base_points)
        });
        self.score = self.score.saturating_add(earned);
        if let Some(me) = self.players.iter_mut().find(|p| p.name == self.player_name) {
            me.score = me.score.saturating_add(earned);
        }
        self.correct_answers += 1;
        let next = escalate(self.difficulty, self.correct_answers, self.config.total_questions);
        if next != self.difficulty {
            debug!(from = %self.difficulty, to = %next, "difficulty escalated");
            self.difficulty = next;
        }
    }

    fn reset_game(&mut self) {
        self.game_state = GameState::Waiting;
        self.score = 0;
        self.correct_answers = 0;
        self.questions_asked = 0;
        self.time_left = self.config.question_secs;
        self.current_question = None;
        self.last_question_id = None;
        self.answered = false;
        self.submitted_answer = None;
        self.last_answer_correct = None;
        self.leaderboard.clear();
        for player in &mut self.players {
            player.score = 0;
        }
    }

    // -- roster -------------------------------------------------------------

    /// Replaces the roster with `incoming` while keeping the existing order for
    /// names that stay. Newcomers are appended in the order the broker sent
    /// them.
    fn merge_roster(&mut self, incoming: Vec<PlayerInfo>) {
        let incoming = dedup_by_name(incoming);
        if incoming.is_empty() && self.game_state != GameState::Waiting {
            warn!(room = %self.room_code, "empty roster during a game ignored");
            return;
        }

        let mut merged = Vec::with_capacity(incoming.len());
        for existing in &self.players {
            if let Some(fresh) = incoming.iter().find(|p| p.name == existing.name) {
                merged.push(fresh.clone());
            }
        }
        for fresh in incoming {
            if !self.players.iter().any(|p| p.name == fresh.name) {
                merged.push(fresh);
            }
        }
        self.players = merged;
    }

    fn remove_player(&mut self, name: &str) {
        let Some(idx) = self.players.iter().position(|p| p.name == name) else {
            return;
        };
        if self.players.len() == 1 && self.game_state != GameState::Waiting {
            warn!(player = name, "refusing to empty the roster mid-game");
            return;
        }
        self.players.remove(idx);
    }
}

/// Drops repeated names, keeping the first occurrence.
fn dedup_by_name(players: Vec<PlayerInfo>) -> Vec<PlayerInfo> {
    let mut seen = HashSet::new();
    players
        .into_iter()
        .filter(|p| {
            let fresh = seen.insert(p.name.clone());
            if !fresh {
                debug!(player = %p.name, "duplicate name in roster dropped");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use triviasync_protocol::{Question, ScoreChange};

    use super::*;
    use crate::{Difficulty, SessionConfig};

    fn playing_with_question() -> Session {
        let mut s = Session::create("ABCD", "Ann", SessionConfig::default());
        s.apply(DomainEvent::GameStarted);
        s.apply(DomainEvent::NewQuestion {
            question: Question {
                id: Some(1),
                text: "Q1".into(),
                answers: vec!["A".into(), "B".into()],
            },
        });
        s
    }

    #[test]
    fn test_start_intent_requires_host() {
        let mut guest = Session::join("ABCD", "Bo", SessionConfig::default());
        guest.apply(LocalIntent::Start);
        assert_eq!(guest.game_state, GameState::Waiting);

        let mut host = Session::create("ABCD", "Ann", SessionConfig::default());
        host.apply(LocalIntent::Start);
        assert_eq!(host.game_state, GameState::Playing);
        assert_eq!(host.players, vec![PlayerInfo::new("Ann", true)]);
    }

    #[test]
    fn test_tick_counts_down_to_review() {
        let mut s = playing_with_question();
        s.apply(LocalIntent::Tick);
        assert_eq!(s.time_left, 29);
        for _ in 0..29 {
            s.apply(LocalIntent::Tick);
        }
        assert_eq!(s.game_state, GameState::AnswerReview);
        assert_eq!(s.current_question, None);
        assert_eq!(s.time_left, 0);
    }

    #[test]
    fn test_tick_without_question_does_nothing() {
        let mut s = Session::create("ABCD", "Ann", SessionConfig::default());
        s.apply(DomainEvent::GameStarted);
        let before = s.clone();
        s.apply(LocalIntent::Tick);
        assert_eq!(s, before);
    }

    #[test]
    fn test_resolve_once_per_question() {
        let mut s = playing_with_question();
        s.apply(LocalIntent::ResolveAnswer { correct: true });
        assert_eq!(s.score, 20);
        assert_eq!(s.correct_answers, 1);
        s.apply(LocalIntent::ResolveAnswer { correct: true });
        assert_eq!(s.score, 20);
        assert_eq!(s.correct_answers, 1);
        assert_eq!(s.player("Ann").map(|p| p.score), Some(20));
    }

    #[test]
    fn test_unnumbered_question_repeat_only_while_shown() {
        let q = Question {
            id: None,
            text: "Q".into(),
            answers: vec![],
        };
        let mut s = Session::join("ABCD", "Ann", SessionConfig::default());
        s.apply(DomainEvent::GameStarted);
        s.apply(DomainEvent::NewQuestion { question: q.clone() });
        s.apply(LocalIntent::Tick);
        s.apply(DomainEvent::NewQuestion { question: q.clone() });
        assert_eq!(s.time_left, 29);
        assert_eq!(s.questions_asked, 1);

        s.apply(LocalIntent::TimeUp);
        s.apply(DomainEvent::NewQuestion { question: q });
        assert_eq!(s.game_state, GameState::Playing);
        assert_eq!(s.questions_asked, 2);
    }

    #[test]
    fn test_wrong_answer_scores_nothing() {
        let mut s = playing_with_question();
        s.apply(LocalIntent::ResolveAnswer { correct: false });
        assert_eq!(s.score, 0);
        assert_eq!(s.last_answer_correct, Some(false));
        assert!(s.answered);
    }

    #[test]
    fn test_server_points_override_formula() {
        let mut s = playing_with_question();
        s.apply(DomainEvent::AnswerSubmitted {
            player_name: "Ann".into(),
            correct: Some(true),
            points: Some(100),
        });
        assert_eq!(s.score, 100);
    }

    #[test]
    fn test_other_players_answers_are_informational() {
        let mut s = playing_with_question();
        let before = s.clone();
        s.apply(DomainEvent::AnswerSubmitted {
            player_name: "Bo".into(),
            correct: Some(true),
            points: Some(100),
        });
        assert_eq!(s, before);
    }

    #[test]
    fn test_submit_answer_recorded_once() {
        let mut s = playing_with_question();
        s.apply(LocalIntent::SubmitAnswer { answer: "A".into() });
        s.apply(LocalIntent::SubmitAnswer { answer: "B".into() });
        assert_eq!(s.submitted_answer.as_deref(), Some("A"));
    }

    #[test]
    fn test_score_update_for_self_not_in_roster() {
        let mut s = Session::join("ABCD", "Ann", SessionConfig::default());
        s.apply(DomainEvent::ScoreUpdate {
            player_name: "Ann".into(),
            change: ScoreChange::Absolute(70),
        });
        assert_eq!(s.score, 70);
    }

    #[test]
    fn test_clear_error_only_clears_matching_seq() {
        let mut s = Session::join("ABCD", "Ann", SessionConfig::default());
        s.apply(DomainEvent::Error { message: "room is full".into() });
        let first = s.error_seq;
        s.apply(DomainEvent::Error { message: "invalid room code".into() });
        s.apply(LocalIntent::ClearError { seq: first });
        assert_eq!(s.last_error.as_deref(), Some("invalid room code"));
        s.apply(LocalIntent::ClearError { seq: s.error_seq });
        assert_eq!(s.last_error, None);
    }

    #[test]
    fn test_play_again_resets_but_keeps_difficulty() {
        let mut s = playing_with_question();
        s.difficulty = Difficulty::Medium;
        s.apply(LocalIntent::ResolveAnswer { correct: true });
        s.apply(DomainEvent::GameOver { leaderboard: vec![] });
        assert_eq!(s.game_state, GameState::Finished);
        assert_eq!(s.leaderboard[0].name, "Ann");

        s.apply(LocalIntent::PlayAgain);
        assert_eq!(s.game_state, GameState::Waiting);
        assert_eq!(s.score, 0);
        assert_eq!(s.correct_answers, 0);
        assert_eq!(s.difficulty, Difficulty::Medium);
        assert!(s.leaderboard.is_empty());
        assert_eq!(s.players[0].score, 0);
    }

    #[test]
    fn test_play_again_requires_host() {
        let mut s = Session::join("ABCD", "Bo", SessionConfig::default());
        s.apply(DomainEvent::GameStarted);
        s.apply(DomainEvent::GameOver { leaderboard: vec![] });
        s.apply(LocalIntent::PlayAgain);
        assert_eq!(s.game_state, GameState::Finished);
    }

    #[test]
    fn test_player_left_cannot_empty_roster_mid_game() {
        let mut s = playing_with_question();
        s.apply(DomainEvent::PlayerLeft { player_name: "Ann".into() });
        assert_eq!(s.players.len(), 1);
    }
}
