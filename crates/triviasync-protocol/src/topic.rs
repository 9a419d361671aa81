//! Logical addresses: inbound [`Topic`]s and outbound [`Destination`]s.
//!
//! Both sets are closed. A topic string that doesn't parse is rejected at
//! subscribe time instead of silently waiting forever for traffic that will
//! never come.

use std::fmt;

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// An inbound broadcast channel the client can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// `/topic/room/{code}`: room-wide lifecycle events.
    Room(String),
    /// `/topic/room/{code}/players`: roster changes for a room.
    RoomPlayers(String),
    /// `/topic/game/{code}`: game progress for a room.
    Game(String),
    /// `/user/queue/player`: events addressed to this player only.
    Player,
    /// `/topic/score`: score broadcasts across rooms.
    Scores,
}

impl Topic {
    /// Parses a topic path. Returns `None` for anything outside the known set.
    ///
    /// ```rust
    /// use triviasync_protocol::Topic;
    ///
    /// assert_eq!(Topic::parse("/topic/room/AB12"), Some(Topic::Room("AB12".into())));
    /// assert_eq!(Topic::parse("/user/queue/player"), Some(Topic::Player));
    /// assert_eq!(Topic::parse("/topic/rooms/AB12"), None);
    /// ```
    pub fn parse(path: &str) -> Option<Self> {
        match path {
            "/user/queue/player" => return Some(Self::Player),
            "/topic/score" => return Some(Self::Scores),
            _ => {}
        }
        if let Some(rest) = path.strip_prefix("/topic/room/") {
            if let Some(code) = rest.strip_suffix("/players") {
                return valid_room_code(code).then(|| Self::RoomPlayers(code.to_owned()));
            }
            return valid_room_code(rest).then(|| Self::Room(rest.to_owned()));
        }
        if let Some(code) = path.strip_prefix("/topic/game/") {
            return valid_room_code(code).then(|| Self::Game(code.to_owned()));
        }
        None
    }

    /// The topic path used in `SUBSCRIBE` frames.
    pub fn path(&self) -> String {
        match self {
            Self::Room(code) => format!("/topic/room/{code}"),
            Self::RoomPlayers(code) => format!("/topic/room/{code}/players"),
            Self::Game(code) => format!("/topic/game/{code}"),
            Self::Player => "/user/queue/player".to_owned(),
            Self::Scores => "/topic/score".to_owned(),
        }
    }

    /// The room this topic belongs to, if it is room-scoped.
    pub fn room_code(&self) -> Option<&str> {
        match self {
            Self::Room(code) | Self::RoomPlayers(code) | Self::Game(code) => {
                Some(code)
            }
            Self::Player | Self::Scores => None,
        }
    }

    /// `true` for topics whose payloads carry no player identifier; the
    /// recipient is implied by the subscription itself.
    pub fn is_player_scoped(&self) -> bool {
        matches!(self, Self::Player)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Room codes are short alphanumeric tokens; anything else is a typo.
pub(crate) fn valid_room_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 32
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// An outbound channel for player intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Create,
    Join,
    Start,
    Answer,
    TimeUp,
    Leave,
}

impl Destination {
    /// The destination path used in `SEND` frames.
    pub fn path(self) -> &'static str {
        match self {
            Self::Create => "/app/create",
            Self::Join => "/app/join",
            Self::Start => "/app/start",
            Self::Answer => "/app/answer",
            Self::TimeUp => "/app/timeup",
            Self::Leave => "/app/leave",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
