//! End-to-end client flows against the mock broker.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{settle, Behavior, MockBroker};
use serde_json::{json, Value};
use triviasync::prelude::*;
use triviasync_protocol::Command;

const ROOM: &str = "/topic/room/ABCD";
const GAME: &str = "/topic/game/ABCD";
const PLAYER: &str = "/user/queue/player";

/// Remembers every score report.
#[derive(Clone, Default)]
struct Recorder {
    updates: Arc<Mutex<Vec<(String, u32)>>>,
}

impl Recorder {
    fn updates(&self) -> Vec<(String, u32)> {
        self.updates.lock().unwrap().clone()
    }
}

impl ScoreService for Recorder {
    async fn update_score(&self, player_name: &str, points: u32) -> Result<(), ServiceError> {
        self.updates
            .lock()
            .unwrap()
            .push((player_name.to_string(), points));
        Ok(())
    }

    async fn high_scores(&self) -> Result<Vec<HighScore>, ServiceError> {
        Ok(Vec::new())
    }
}

async fn connected(broker: &MockBroker, scores: Recorder) -> ClientHandle {
    let client = TriviaClient::builder()
        .score_service(scores)
        .build_with(broker.clone());
    client
        .connectivity()
        .wait_for(|c| c.is_connected())
        .await
        .unwrap();
    client
}

fn session(client: &ClientHandle) -> Session {
    client.session().borrow().clone().expect("no session")
}

fn body(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap()
}

fn roster(names: &[(&str, u32, bool)]) -> String {
    let players: Vec<_> = names
        .iter()
        .map(|(name, score, host)| json!({ "name": name, "score": score, "isHost": host }))
        .collect();
    json!({ "type": "PLAYER_JOINED", "players": players }).to_string()
}

fn question(id: u64, text: &str) -> String {
    json!({
        "type": "NEW_QUESTION",
        "question": { "id": id, "text": text, "answers": ["3", "4", "5"] }
    })
    .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_host_plays_a_full_game() {
    let broker = MockBroker::new(Behavior::Accept);
    let scores = Recorder::default();
    let client = connected(&broker, scores.clone()).await;
    let link = broker.link();

    // Create: three room topics, then the create message.
    assert!(client.create_room("ABCD", "Ann").await.unwrap());
    settle().await;
    let subs = link.subscriptions();
    assert_eq!(subs.len(), 3);
    for topic in [ROOM, GAME, PLAYER] {
        assert!(subs.contains_key(topic), "missing {topic}");
    }
    assert_eq!(
        link.sends_to("/app/create")
            .iter()
            .map(|b| body(b))
            .collect::<Vec<_>>(),
        vec![json!({ "roomCode": "ABCD", "playerName": "Ann" })]
    );
    let s = session(&client);
    assert!(s.is_host);
    assert_eq!(s.game_state, GameState::Waiting);

    // Roster.
    assert!(link.publish(ROOM, &roster(&[("Ann", 0, true), ("Bob", 0, false)])));
    settle().await;
    let names: Vec<_> = session(&client)
        .players
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, ["Ann", "Bob"]);

    // Start.
    assert!(client.start_game().await.unwrap());
    assert_eq!(link.sends_to("/app/start").len(), 1);
    assert_eq!(session(&client).game_state, GameState::Playing);
    assert!(!client.start_game().await.unwrap(), "second start is ignored");

    // First question; answer it right away.
    assert!(link.publish(GAME, &question(1, "2+2?")));
    settle().await;
    let s = session(&client);
    assert_eq!(s.current_question.as_ref().unwrap().text, "2+2?");
    assert_eq!(s.time_left, 30);
    assert_eq!(s.questions_asked, 1);

    assert!(client.submit_answer("4").await.unwrap());
    assert!(!client.submit_answer("5").await.unwrap(), "one answer per question");
    let answers = link.sends_to("/app/answer");
    assert_eq!(answers.len(), 1);
    assert_eq!(
        body(&answers[0]),
        json!({ "roomCode": "ABCD", "playerName": "Ann", "answer": "4", "timeRemaining": 30 })
    );

    client.resolve_answer(true).await.unwrap();
    settle().await;
    let s = session(&client);
    assert_eq!(s.score, 20);
    assert_eq!(s.correct_answers, 1);
    assert_eq!(s.last_answer_correct, Some(true));
    assert_eq!(s.player("Ann").unwrap().score, 20);
    assert_eq!(scores.updates(), [("Ann".to_string(), 20)]);

    // The clock runs out: review, and the broker is told exactly once.
    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    let s = session(&client);
    assert_eq!(s.game_state, GameState::AnswerReview);
    assert_eq!(s.time_left, 0);
    assert_eq!(link.sends_to("/app/timeup").len(), 1);

    assert!(link.publish(GAME, r#"{"type":"TIME_UP"}"#));
    settle().await;
    assert_eq!(session(&client).game_state, GameState::AnswerReview);
    assert_eq!(link.sends_to("/app/timeup").len(), 1);

    // Game over.
    let over = json!({
        "type": "GAME_OVER",
        "players": [
            { "name": "Ann", "score": 20, "isHost": true },
            { "name": "Bob", "score": 30, "isHost": false }
        ]
    });
    assert!(link.publish(GAME, &over.to_string()));
    settle().await;
    let s = session(&client);
    assert_eq!(s.game_state, GameState::Finished);
    let standings: Vec<_> = s.leaderboard.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(standings, ["Bob", "Ann"]);

    // Again, same room.
    assert!(client.play_again().await.unwrap());
    let s = session(&client);
    assert_eq!(s.game_state, GameState::Waiting);
    assert_eq!(s.score, 0);
    assert!(s.leaderboard.is_empty());
    assert_eq!(scores.updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_is_shown_then_cleared() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;
    let link = broker.link();
    assert!(client.join_room("ABCD", "Bob").await.unwrap());
    settle().await;

    assert!(link.publish(PLAYER, r#"{"type":"ROOM_FULL"}"#));
    settle().await;
    assert_eq!(session(&client).last_error.as_deref(), Some("room is full"));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(session(&client).last_error.is_some());

    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(session(&client).last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_newer_error_is_not_cleared_early() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;
    let link = broker.link();
    assert!(client.join_room("ABCD", "Bob").await.unwrap());
    settle().await;

    assert!(link.publish(PLAYER, r#"{"type":"ERROR","message":"first"}"#));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(link.publish(PLAYER, r#"{"type":"ERROR","message":"second"}"#));

    // The first error's timer fires here; the second is still on screen.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(session(&client).last_error.as_deref(), Some("second"));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(session(&client).last_error, None);
}

#[tokio::test(start_paused = true)]
async fn test_leave_room_unsubscribes_everything() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;
    let link = broker.link();
    assert!(client.join_room("ABCD", "Bob").await.unwrap());
    settle().await;

    assert!(client.leave_room().await.unwrap());
    settle().await;
    assert_eq!(
        link.sends_to("/app/leave")
            .iter()
            .map(|b| body(b))
            .collect::<Vec<_>>(),
        vec![json!({ "roomCode": "ABCD", "playerName": "Bob" })]
    );
    assert_eq!(link.count(Command::Unsubscribe), 3);
    assert!(link.subscriptions().is_empty());
    assert!(client.session().borrow().is_none());

    // Nothing left to leave.
    assert!(!client.leave_room().await.unwrap());
    assert!(!link.publish(ROOM, &roster(&[("Bob", 0, false)])));
}

#[tokio::test(start_paused = true)]
async fn test_switching_rooms_ignores_the_old_room() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;
    let link = broker.link();
    assert!(client.join_room("ABCD", "Bob").await.unwrap());
    settle().await;
    let old_room = link.subscriptions()[ROOM].clone();

    assert!(client.join_room("WXYZ", "Bob").await.unwrap());
    settle().await;
    assert_eq!(link.sends_to("/app/leave").len(), 1);
    assert!(link.subscriptions().contains_key("/topic/room/WXYZ"));
    assert!(!link.subscriptions().contains_key(ROOM));

    // A late frame for the old room's subscription goes nowhere.
    link.push_frame(link.message(&old_room, ROOM, &roster(&[("Eve", 0, false)])));
    settle().await;
    let s = session(&client);
    assert_eq!(s.room_code, "WXYZ");
    assert!(s.player("Eve").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_room_survives_reconnect() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;
    assert!(client.join_room("ABCD", "Bob").await.unwrap());
    settle().await;

    broker.link().close();
    settle().await;
    assert!(!client.is_connected());
    client
        .connectivity()
        .wait_for(|c| c.is_connected())
        .await
        .unwrap();
    settle().await;

    let link = broker.link();
    assert_eq!(broker.links().len(), 2);
    assert_eq!(link.subscriptions().len(), 3);
    assert!(link.publish(ROOM, &roster(&[("Ann", 0, true), ("Bob", 0, false)])));
    settle().await;
    assert_eq!(session(&client).players.len(), 2);
    assert_eq!(session(&client).room_code, "ABCD");
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_right_after_connect_is_live() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;

    // No settle: the loop may not have seen the connection yet.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let scores = "/topic/score";
    let sub = client
        .subscribe(
            scores,
            handler(move |event| sink.lock().unwrap().push(event.clone())),
        )
        .await
        .unwrap();
    assert!(!sub.is_noop());
    assert_eq!(sub.topic(), scores);

    settle().await;
    let link = broker.link();
    assert!(link.subscriptions().contains_key(scores));
    let update = json!({ "type": "SCORE_UPDATE", "playerName": "Ann", "score": 7 });
    assert!(link.publish(scores, &update.to_string()));
    settle().await;
    assert_eq!(
        *seen.lock().unwrap(),
        [DomainEvent::ScoreUpdate {
            player_name: "Ann".into(),
            change: ScoreChange::Absolute(7),
        }]
    );

    sub.unsubscribe();
    settle().await;
    assert_eq!(link.count(Command::Unsubscribe), 1);
}

#[tokio::test(start_paused = true)]
async fn test_intents_while_disconnected_are_ignored() {
    let broker = MockBroker::new(Behavior::Refuse);
    let client = TriviaClient::builder().build_with(broker.clone());
    settle().await;

    assert!(!client.is_connected());
    assert!(!client.join_room("ABCD", "Ann").await.unwrap());
    assert!(!client.create_room("ABCD", "Ann").await.unwrap());
    assert!(client.session().borrow().is_none());
    assert!(!client.start_game().await.unwrap());
    assert!(!client.submit_answer("4").await.unwrap());
    assert!(broker.links().is_empty());

    let handle = client.subscribe(ROOM, handler(|_| {})).await.unwrap();
    assert!(handle.is_noop());
}

#[tokio::test(start_paused = true)]
async fn test_only_host_can_start() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;
    assert!(client.join_room("ABCD", "Bob").await.unwrap());

    assert!(!client.start_game().await.unwrap());
    assert!(broker.link().sends_to("/app/start").is_empty());
    assert_eq!(session(&client).game_state, GameState::Waiting);

    // The host's start reaches everyone.
    assert!(broker.link().publish(GAME, r#"{"type":"GAME_STARTED"}"#));
    settle().await;
    let s = session(&client);
    assert_eq!(s.game_state, GameState::Playing);
    assert_eq!(s.players.len(), 1);
    assert!(!client.play_again().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_leaves_and_closes() {
    let broker = MockBroker::new(Behavior::Accept);
    let client = connected(&broker, Recorder::default()).await;
    assert!(client.join_room("ABCD", "Bob").await.unwrap());

    client.shutdown().await;
    settle().await;
    let link = broker.link();
    assert_eq!(link.sends_to("/app/leave").len(), 1);
    assert_eq!(link.count(Command::Disconnect), 1);
    assert!(link.is_closed());
    assert!(client.connectivity().borrow().terminal);
    assert!(matches!(
        client.join_room("ABCD", "Bob").await,
        Err(TriviaError::Closed)
    ));
}
