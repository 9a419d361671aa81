//! The message router: inbound body + topic → [`DomainEvent`].
//!
//! Routing is purely structural. The `type` tag is checked against
//! [`MessageType`] first, so an unknown tag is reported as such instead of as
//! a generic serde failure. Only then are the variant's fields decoded.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{DecodeError, DomainEvent, MessageType, PlayerInfo, Question, ScoreChange, Topic};

// ---------------------------------------------------------------------------
// Wire shapes (private; only the router sees them)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RosterBody {
    players: Vec<PlayerInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerLeftBody {
    #[serde(alias = "username")]
    player_name: String,
}

#[derive(Deserialize)]
struct QuestionBody {
    question: Option<Question>,
    id: Option<u64>,
    #[serde(alias = "questionText")]
    text: Option<String>,
    #[serde(default, alias = "possibleAnswers")]
    answers: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerBody {
    #[serde(alias = "username")]
    player_name: Option<String>,
    correct: Option<bool>,
    points: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreBody {
    #[serde(alias = "username")]
    player_name: Option<String>,
    score: Option<u32>,
    points: Option<u32>,
}

#[derive(Deserialize)]
struct GameOverBody {
    #[serde(default, alias = "leaderboard")]
    players: Vec<PlayerInfo>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// route
// ---------------------------------------------------------------------------

/// Decodes an inbound body that arrived on `topic`.
///
/// `identity` is the local player's name. Player-scoped topics carry no player
/// field in their payloads, so `SCORE_UPDATE` and `ANSWER_SUBMITTED` on such a
/// topic are attributed to `identity`.
///
/// # Errors
/// Any [`DecodeError`]. Callers log and drop; nothing here is fatal.
///
/// ```rust
/// use triviasync_protocol::{route, DomainEvent, ScoreChange, Topic};
///
/// let event = route(&Topic::Player, br#"{"type":"SCORE_UPDATE","score":40}"#, Some("Ann")).unwrap();
/// assert_eq!(
///     event,
///     DomainEvent::ScoreUpdate { player_name: "Ann".into(), change: ScoreChange::Absolute(40) }
/// );
/// ```
pub fn route(
    topic: &Topic,
    body: &[u8],
    identity: Option<&str>,
) -> Result<DomainEvent, DecodeError> {
    let value: Value = serde_json::from_slice(body).map_err(DecodeError::Malformed)?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    let kind = MessageType::from_tag(tag)
        .ok_or_else(|| DecodeError::UnknownType(tag.to_owned()))?;
    let tag = kind.as_tag();

    let event = match kind {
        MessageType::PlayerJoined => {
            let body: RosterBody = fields(tag, value)?;
            DomainEvent::PlayerJoined {
                players: body.players,
            }
        }
        MessageType::PlayerLeft => {
            let body: PlayerLeftBody = fields(tag, value)?;
            DomainEvent::PlayerLeft {
                player_name: body.player_name,
            }
        }
        MessageType::GameStarted => DomainEvent::GameStarted,
        MessageType::NewQuestion => {
            let body: QuestionBody = fields(tag, value)?;
            let question = match body.question {
                Some(question) => question,
                None => Question {
                    id: body.id,
                    text: body.text.ok_or(DecodeError::MissingField {
                        tag,
                        field: "text",
                    })?,
                    answers: body.answers,
                },
            };
            DomainEvent::NewQuestion { question }
        }
        MessageType::AnswerSubmitted => {
            let body: AnswerBody = fields(tag, value)?;
            DomainEvent::AnswerSubmitted {
                player_name: recipient(topic, tag, body.player_name, identity)?,
                correct: body.correct,
                points: body.points,
            }
        }
        MessageType::TimeUp => DomainEvent::TimeUp,
        MessageType::ScoreUpdate => {
            let body: ScoreBody = fields(tag, value)?;
            let change = match (body.score, body.points) {
                (Some(score), _) => ScoreChange::Absolute(score),
                (None, Some(points)) => ScoreChange::Delta(points),
                (None, None) => {
                    return Err(DecodeError::MissingField {
                        tag,
                        field: "score",
                    });
                }
            };
            DomainEvent::ScoreUpdate {
                player_name: recipient(topic, tag, body.player_name, identity)?,
                change,
            }
        }
        MessageType::GameOver => {
            let body: GameOverBody = fields(tag, value)?;
            DomainEvent::GameOver {
                leaderboard: body.players,
            }
        }
        MessageType::Error => {
            let body: ErrorBody = fields(tag, value)?;
            DomainEvent::Error {
                message: body.message.unwrap_or_else(|| "unknown error".into()),
            }
        }
        MessageType::RoomFull => {
            let body: ErrorBody = fields(tag, value)?;
            DomainEvent::Error {
                message: body.message.unwrap_or_else(|| "room is full".into()),
            }
        }
        MessageType::InvalidRoom => {
            let body: ErrorBody = fields(tag, value)?;
            DomainEvent::Error {
                message: body.message.unwrap_or_else(|| "invalid room code".into()),
            }
        }
    };

    Ok(event)
}

fn fields<T: DeserializeOwned>(tag: &'static str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::InvalidFields { tag, source })
}

/// Resolves who a per-player event is about.
fn recipient(
    topic: &Topic,
    tag: &'static str,
    named: Option<String>,
    identity: Option<&str>,
) -> Result<String, DecodeError> {
    if topic.is_player_scoped() {
        return identity
            .map(str::to_owned)
            .ok_or(DecodeError::MissingIdentity { tag });
    }
    named.ok_or(DecodeError::MissingField {
        tag,
        field: "playerName",
    })
}
