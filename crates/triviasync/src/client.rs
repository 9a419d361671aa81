//! `TriviaClient` builder and the client dispatch loop.
//!
//! The loop is an actor: it owns the current [`Session`], the countdown and
//! the room's subscriptions, and it is the only code that feeds the reducer.
//! Everything reaches it over channels:
//!
//! ```text
//! ClientHandle ──commands──┐
//! ConnectionManager ─events┼──→ dispatch loop ──reduce──→ watch<Option<Session>>
//! room handlers ──inputs───┤            │
//! Countdown ───ticks───────┘            └──→ IntentDispatcher ──→ broker
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use triviasync_protocol::{DomainEvent, Topic};
use triviasync_session::{GameState, Input, LocalIntent, Session};
use triviasync_tick::{Countdown, Tick};
use triviasync_transport::{Connector, WebSocketConnector};

use crate::{
    handler, ClientConfig, ConnectionHandle, ConnectionManager, ConnectionState,
    Handler, IntentDispatcher, NullScoreService, ScoreService, Subscription,
    SubscriptionRegistry, TransportEvent, TriviaError,
};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Entry point.
pub struct TriviaClient;

impl TriviaClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

/// Builder for configuring and starting a client.
///
/// # Example
///
/// ```rust,no_run
/// use triviasync::prelude::*;
///
/// # async fn run() {
/// let client = TriviaClient::builder()
///     .url("ws://localhost:8080/ws")
///     .build();
/// client.join_room("ABCD", "Ann").await.ok();
/// # }
/// ```
pub struct ClientBuilder<S = NullScoreService> {
    config: ClientConfig,
    scores: S,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            scores: NullScoreService,
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ScoreService> ClientBuilder<S> {
    /// Sets the broker URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the service told about locally scored points.
    pub fn score_service<S2: ScoreService>(self, scores: S2) -> ClientBuilder<S2> {
        ClientBuilder {
            config: self.config,
            scores,
        }
    }

    /// Starts the client against the configured WebSocket URL.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> ClientHandle {
        let connector = WebSocketConnector::new(self.config.url.clone());
        self.build_with(connector)
    }

    /// Starts the client over any [`Connector`].
    pub fn build_with<C: Connector>(self, connector: C) -> ClientHandle {
        let config = self.config;
        let (connection, transport, _manager) =
            ConnectionManager::spawn(connector, config.clone());
        let registry = SubscriptionRegistry::new(connection.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (session_tx, session_rx) = watch::channel(None);
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let actor = ClientActor {
            dispatcher: IntentDispatcher::new(connection.clone()),
            registry,
            connection: connection.clone(),
            scores: Arc::new(self.scores),
            countdown: Countdown::default(),
            clock_question: 0,
            session: None,
            session_tx,
            room_subs: Vec::new(),
            room_epoch: 0,
            input_tx,
            input_rx,
            commands: cmd_rx,
            transport,
            config,
        };
        tokio::spawn(actor.run());

        ClientHandle {
            commands: cmd_tx,
            session: session_rx,
            connection,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum ClientCommand {
    EnterRoom {
        room_code: String,
        player_name: String,
        host: bool,
        reply: oneshot::Sender<bool>,
    },
    StartGame {
        reply: oneshot::Sender<bool>,
    },
    SubmitAnswer {
        answer: String,
        reply: oneshot::Sender<bool>,
    },
    ResolveAnswer {
        correct: bool,
    },
    PlayAgain {
        reply: oneshot::Sender<bool>,
    },
    LeaveRoom {
        reply: oneshot::Sender<bool>,
    },
    Subscribe {
        topic: String,
        handler: Handler,
        reply: oneshot::Sender<Subscription>,
    },
    Shutdown,
}

/// Handle to a running client. Cheap to clone.
///
/// Intent methods return `Ok(true)` when the intent went to the broker,
/// `Ok(false)` when it was ignored (disconnected, not host, wrong state), and
/// `Err(TriviaError::Closed)` once the client has shut down.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<ClientCommand>,
    session: watch::Receiver<Option<Session>>,
    connection: ConnectionHandle,
}

impl ClientHandle {
    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<bool>) -> ClientCommand,
    ) -> Result<bool, TriviaError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| TriviaError::Closed)?;
        reply_rx.await.map_err(|_| TriviaError::Closed)
    }

    /// Creates a room and enters it as host.
    pub async fn create_room(
        &self,
        room_code: &str,
        player_name: &str,
    ) -> Result<bool, TriviaError> {
        self.enter_room(room_code, player_name, true).await
    }

    /// Joins an existing room.
    pub async fn join_room(
        &self,
        room_code: &str,
        player_name: &str,
    ) -> Result<bool, TriviaError> {
        self.enter_room(room_code, player_name, false).await
    }

    async fn enter_room(
        &self,
        room_code: &str,
        player_name: &str,
        host: bool,
    ) -> Result<bool, TriviaError> {
        let room_code = room_code.to_string();
        let player_name = player_name.to_string();
        self.request(|reply| ClientCommand::EnterRoom {
            room_code,
            player_name,
            host,
            reply,
        })
        .await
    }

    /// Host only.
    pub async fn start_game(&self) -> Result<bool, TriviaError> {
        self.request(|reply| ClientCommand::StartGame { reply }).await
    }

    /// Answers the current question. One answer per question.
    pub async fn submit_answer(&self, answer: &str) -> Result<bool, TriviaError> {
        let answer = answer.to_string();
        self.request(|reply| ClientCommand::SubmitAnswer { answer, reply })
            .await
    }

    /// Feeds a client-side verdict for the current question.
    pub async fn resolve_answer(&self, correct: bool) -> Result<(), TriviaError> {
        self.commands
            .send(ClientCommand::ResolveAnswer { correct })
            .await
            .map_err(|_| TriviaError::Closed)
    }

    /// Host only, after a game is over.
    pub async fn play_again(&self) -> Result<bool, TriviaError> {
        self.request(|reply| ClientCommand::PlayAgain { reply }).await
    }

    pub async fn leave_room(&self) -> Result<bool, TriviaError> {
        self.request(|reply| ClientCommand::LeaveRoom { reply }).await
    }

    /// Registers an extra handler on any known topic.
    ///
    /// Runs on the client loop, so a connection this handle already reports
    /// is live is also live for the registry. The returned handle is a no-op
    /// for unknown topics or while disconnected.
    pub async fn subscribe(
        &self,
        topic: &str,
        handler: Handler,
    ) -> Result<Subscription, TriviaError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ClientCommand::Subscribe {
                topic: topic.to_string(),
                handler,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TriviaError::Closed)?;
        reply_rx.await.map_err(|_| TriviaError::Closed)
    }

    /// The current session, `None` outside a room.
    pub fn session(&self) -> watch::Receiver<Option<Session>> {
        self.session.clone()
    }

    pub fn connectivity(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Leaves the room, disconnects and stops the client.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(ClientCommand::Shutdown).await;
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A reducer input tagged with the room it belongs to.
struct RoomInput {
    epoch: u64,
    input: Input,
}

struct ClientActor<S: ScoreService> {
    config: ClientConfig,
    dispatcher: IntentDispatcher,
    registry: SubscriptionRegistry,
    connection: ConnectionHandle,
    scores: Arc<S>,
    countdown: Countdown,
    /// `questions_asked` when the countdown was last started.
    clock_question: u32,
    session: Option<Session>,
    session_tx: watch::Sender<Option<Session>>,
    room_subs: Vec<Subscription>,
    /// Bumped on every room change; inputs from an older room are dropped.
    room_epoch: u64,
    input_tx: mpsc::UnboundedSender<RoomInput>,
    input_rx: mpsc::UnboundedReceiver<RoomInput>,
    commands: mpsc::Receiver<ClientCommand>,
    transport: mpsc::Receiver<TransportEvent>,
}

impl<S: ScoreService> ClientActor<S> {
    async fn run(mut self) {
        info!("client started");

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.transport.recv() => self.handle_transport(event),
                Some(RoomInput { epoch, input }) = self.input_rx.recv() => {
                    if epoch == self.room_epoch {
                        self.apply(input);
                    } else {
                        debug!(epoch, current = self.room_epoch, "input from a previous room dropped");
                    }
                }
                tick = self.countdown.wait_for_tick() => {
                    debug!(remaining = tick.remaining, "countdown tick");
                    self.on_tick(tick);
                }
            }
        }

        self.leave_room();
        self.connection.disconnect().await;
        info!("client stopped");
    }

    fn handle_command(&mut self, command: ClientCommand) {
        // Connectivity the handle has already observed must be visible to
        // the registry before the command runs.
        while let Ok(event) = self.transport.try_recv() {
            self.handle_transport(event);
        }

        match command {
            ClientCommand::EnterRoom {
                room_code,
                player_name,
                host,
                reply,
            } => {
                let _ = reply.send(self.enter_room(room_code, player_name, host));
            }
            ClientCommand::StartGame { reply } => {
                let _ = reply.send(self.start_game());
            }
            ClientCommand::SubmitAnswer { answer, reply } => {
                let _ = reply.send(self.submit_answer(answer));
            }
            ClientCommand::ResolveAnswer { correct } => {
                self.apply(LocalIntent::ResolveAnswer { correct }.into());
            }
            ClientCommand::PlayAgain { reply } => {
                let can = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.is_host && s.game_state == GameState::Finished);
                if can {
                    self.apply(LocalIntent::PlayAgain.into());
                }
                let _ = reply.send(can);
            }
            ClientCommand::LeaveRoom { reply } => {
                let _ = reply.send(self.leave_room());
            }
            ClientCommand::Subscribe {
                topic,
                handler,
                reply,
            } => {
                let _ = reply.send(self.registry.subscribe(&topic, handler));
            }
            ClientCommand::Shutdown => {}
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { generation } => {
                self.registry.on_connected(generation);
            }
            TransportEvent::Message(frame) => {
                self.registry.dispatch(&frame);
            }
            TransportEvent::Disconnected { terminal } => {
                self.registry.on_disconnected(terminal);
                if terminal {
                    // The registry has forgotten them; the handles are dead.
                    self.room_subs.clear();
                }
            }
        }
    }

    // -- intents ------------------------------------------------------------

    fn enter_room(&mut self, room_code: String, player_name: String, host: bool) -> bool {
        if !self.connection.is_connected() {
            debug!(%room_code, "not connected, room change ignored");
            return false;
        }
        self.leave_room();

        self.room_epoch += 1;
        let session = if host {
            Session::create(room_code.clone(), player_name.clone(), self.config.session.clone())
        } else {
            Session::join(room_code.clone(), player_name.clone(), self.config.session.clone())
        };
        self.session = Some(session);
        self.registry.set_identity(Some(player_name.clone()));

        let forward = self.forwarder();
        for topic in [
            Topic::Room(room_code.clone()),
            Topic::Game(room_code.clone()),
            Topic::Player,
        ] {
            let sub = self.registry.subscribe(&topic.path(), Arc::clone(&forward));
            self.room_subs.push(sub);
        }

        let sent = if host {
            self.dispatcher.create_room(&room_code, &player_name)
        } else {
            self.dispatcher.join_room(&room_code, &player_name)
        };
        info!(%room_code, %player_name, host, sent, "entered room");
        self.sync();
        sent
    }

    /// A handler that forwards routed events into the loop, tagged with the
    /// current room.
    fn forwarder(&self) -> Handler {
        let tx = self.input_tx.clone();
        let epoch = self.room_epoch;
        handler(move |event: &DomainEvent| {
            let _ = tx.send(RoomInput {
                epoch,
                input: event.clone().into(),
            });
        })
    }

    fn start_game(&mut self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if !session.is_host || session.game_state != GameState::Waiting {
            debug!("start ignored: not host or game already running");
            return false;
        }
        let sent = self
            .dispatcher
            .start_game(&session.room_code, &session.player_name);
        if sent {
            self.apply(LocalIntent::Start.into());
        }
        sent
    }

    fn submit_answer(&mut self, answer: String) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if !session.clock_running() || session.answered || session.submitted_answer.is_some() {
            debug!("answer ignored: no open question");
            return false;
        }
        let sent = self.dispatcher.submit_answer(
            &session.room_code,
            &session.player_name,
            &answer,
            session.time_left,
        );
        if sent {
            self.apply(LocalIntent::SubmitAnswer { answer }.into());
        }
        sent
    }

    /// Leaves the current room, if any. Returns whether `leave` went out.
    fn leave_room(&mut self) -> bool {
        for sub in self.room_subs.drain(..) {
            sub.unsubscribe();
        }
        let Some(session) = self.session.take() else {
            return false;
        };
        self.room_epoch += 1;
        self.registry.set_identity(None);
        let sent = self
            .dispatcher
            .leave_room(&session.room_code, &session.player_name);
        info!(room_code = %session.room_code, sent, "left room");
        self.sync();
        sent
    }

    // -- reducer ------------------------------------------------------------

    /// Feeds one input to the reducer and runs its side effects.
    fn apply(&mut self, input: Input) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let before_score = session.score;
        let before_error = session.error_seq;
        let locally_scored = matches!(
            &input,
            Input::Local(LocalIntent::ResolveAnswer { .. })
                | Input::Event(DomainEvent::AnswerSubmitted { points: None, .. })
        );

        session.apply(input);

        let clear = (session.error_seq != before_error).then_some(session.error_seq);
        if clear.is_some() {
            if let Some(message) = &session.last_error {
                warn!(room_code = %session.room_code, %message, "broker reported an error");
            }
        }
        let earned = (locally_scored && session.score > before_score)
            .then(|| (session.player_name.clone(), session.score - before_score));

        if let Some(seq) = clear {
            self.schedule_clear(seq);
        }
        if let Some((player, points)) = earned {
            self.report_score(player, points);
        }
        self.sync();
    }

    /// A countdown tick. If it is the last one and it ends the question, the
    /// broker hears about it from us.
    fn on_tick(&mut self, tick: Tick) {
        let was_playing = self
            .session
            .as_ref()
            .is_some_and(|s| s.game_state == GameState::Playing);
        self.apply(LocalIntent::Tick.into());
        if !tick.expired {
            return;
        }

        if let Some(session) = &self.session {
            if was_playing && session.game_state == GameState::AnswerReview {
                debug!(room_code = %session.room_code, "time up");
                self.dispatcher
                    .time_up(&session.room_code, &session.player_name);
            }
        }
    }

    fn report_score(&self, player: String, points: u32) {
        let scores = Arc::clone(&self.scores);
        tokio::spawn(async move {
            if let Err(e) = scores.update_score(&player, points).await {
                warn!(%player, error = %e, "score service update failed");
            }
        });
    }

    fn schedule_clear(&self, seq: u64) {
        let tx = self.input_tx.clone();
        let epoch = self.room_epoch;
        let delay = self.config.error_display;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RoomInput {
                epoch,
                input: LocalIntent::ClearError { seq }.into(),
            });
        });
    }

    /// Aligns the countdown with the session and publishes it.
    fn sync(&mut self) {
        match &self.session {
            Some(session) if session.clock_running() => {
                if !self.countdown.is_running() || self.clock_question != session.questions_asked {
                    self.countdown.start(session.time_left);
                    self.clock_question = session.questions_asked;
                }
            }
            _ => self.countdown.stop(),
        }
        self.session_tx.send_replace(self.session.clone());
    }
}
