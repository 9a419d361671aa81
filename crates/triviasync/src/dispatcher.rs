//! Outbound intent dispatcher.
//!
//! One method per player intent. Each builds the JSON body, wraps it in a
//! STOMP `SEND` to the intent's fixed destination and hands it to the
//! connection. Every method returns whether the frame was handed off; while
//! disconnected that is `false` and nothing is queued.

use serde::Serialize;
use tracing::{debug, warn};
use triviasync_protocol::{AnswerRequest, Codec, Destination, Frame, JsonCodec, RoomRequest};

use crate::ConnectionHandle;

/// Turns player intents into broker messages.
#[derive(Clone)]
pub struct IntentDispatcher<C: Codec = JsonCodec> {
    connection: ConnectionHandle,
    codec: C,
}

impl IntentDispatcher {
    /// A dispatcher with JSON bodies.
    pub fn new(connection: ConnectionHandle) -> Self {
        Self::with_codec(connection, JsonCodec)
    }
}

impl<C: Codec> IntentDispatcher<C> {
    pub fn with_codec(connection: ConnectionHandle, codec: C) -> Self {
        Self { connection, codec }
    }

    pub fn create_room(&self, room_code: &str, player_name: &str) -> bool {
        self.dispatch(Destination::Create, &room(room_code, player_name))
    }

    pub fn join_room(&self, room_code: &str, player_name: &str) -> bool {
        self.dispatch(Destination::Join, &room(room_code, player_name))
    }

    pub fn start_game(&self, room_code: &str, player_name: &str) -> bool {
        self.dispatch(Destination::Start, &room(room_code, player_name))
    }

    /// Sends the player's answer with the seconds left on their clock.
    pub fn submit_answer(
        &self,
        room_code: &str,
        player_name: &str,
        answer: &str,
        time_remaining: u32,
    ) -> bool {
        let body = AnswerRequest {
            room_code: room_code.to_string(),
            player_name: player_name.to_string(),
            answer: answer.to_string(),
            time_remaining,
        };
        self.dispatch(Destination::Answer, &body)
    }

    /// Tells the broker the local countdown ran out.
    pub fn time_up(&self, room_code: &str, player_name: &str) -> bool {
        self.dispatch(Destination::TimeUp, &room(room_code, player_name))
    }

    pub fn leave_room(&self, room_code: &str, player_name: &str) -> bool {
        self.dispatch(Destination::Leave, &room(room_code, player_name))
    }

    fn dispatch<T: Serialize>(&self, destination: Destination, body: &T) -> bool {
        let destination = destination.path();
        if !self.connection.is_connected() {
            debug!(%destination, "not connected, intent dropped");
            return false;
        }
        let body = match self.codec.encode(body) {
            Ok(body) => body,
            Err(e) => {
                warn!(%destination, error = %e, "failed to encode intent");
                return false;
            }
        };
        let frame = Frame::send(destination, self.codec.content_type(), body);
        let sent = self.connection.send(frame);
        debug!(%destination, sent, "intent dispatched");
        sent
    }
}

fn room(room_code: &str, player_name: &str) -> RoomRequest {
    RoomRequest {
        room_code: room_code.to_string(),
        player_name: player_name.to_string(),
    }
}
