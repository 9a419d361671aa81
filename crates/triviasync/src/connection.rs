//! Transport connection manager.
//!
//! One task owns the physical connection. It dials through a [`Connector`],
//! runs the STOMP handshake, keeps heartbeats flowing, and reconnects after
//! unsolicited drops:
//!
//! ```text
//!                 ┌──────────── reconnect_delay ────────────┐
//!                 ↓                                          │
//! Disconnected → Connecting ──ok──→ Connected ──drop──→ Disconnected
//!                 │                                          ↑
//!                 └──────────────fail────────────────────────┘
//!                 (attempts > max_reconnect_attempts → terminal)
//! ```
//!
//! Errors never leave the task. They are logged and recorded in
//! [`ConnectionState::last_error`]; the rest of the client sees only the
//! [`watch`] channel and the [`TransportEvent`] stream.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use triviasync_protocol::{
    negotiate_heartbeat, parse_heartbeat, Command, Decoded, Frame, HEARTBEAT,
};
use triviasync_transport::{Connection, Connector, TransportError};

use crate::{ClientConfig, TriviaError};

// ---------------------------------------------------------------------------
// State and events
// ---------------------------------------------------------------------------

/// Coarse connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Reconnect attempt in progress or about to start. 0 while connected.
    pub reconnect_attempt: u32,
    pub last_error: Option<String>,
    /// Set once the manager has stopped for good, either because the
    /// reconnect budget ran out or because `disconnect()` was called.
    pub terminal: bool,
    /// Identifies the live physical connection. Bumped on every successful
    /// handshake; 0 before the first one.
    pub generation: u64,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// What the manager tells the client loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new physical connection finished its handshake. Anything tied to an
    /// older generation is stale.
    Connected { generation: u64 },
    /// An inbound STOMP `MESSAGE`.
    Message(Frame),
    /// The live connection is gone. `terminal` means no reconnect follows.
    Disconnected { terminal: bool },
}

enum ConnectionCommand {
    Send(Frame),
    Disconnect,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable access to a running connection manager.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<ConnectionCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Queues a frame for the live connection.
    ///
    /// Returns `false`, dropping the frame, when not connected or when the
    /// outbound queue is full. Nothing is retried.
    pub fn send(&self, frame: Frame) -> bool {
        if !self.is_connected() {
            debug!(command = frame.command.as_str(), "not connected, frame dropped");
            return false;
        }
        match self.commands.try_send(ConnectionCommand::Send(frame)) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "outbound queue unavailable, frame dropped");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Current snapshot.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Sends `DISCONNECT`, closes the socket and stops reconnecting.
    ///
    /// Safe to call more than once.
    pub async fn disconnect(&self) {
        let _ = self.commands.send(ConnectionCommand::Disconnect).await;
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Why a served connection ended.
enum Exit {
    /// `disconnect()` was called, or every handle is gone.
    Shutdown,
    /// Anything else; we reconnect.
    Lost(String),
}

/// Negotiated heartbeat periods for one connection.
#[derive(Debug, Clone, Copy)]
struct Heartbeats {
    outgoing: Option<Duration>,
    incoming: Option<Duration>,
}

/// The task that owns the physical connection.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    config: ClientConfig,
    commands: mpsc::Receiver<ConnectionCommand>,
    events: mpsc::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    generation: u64,
}

impl<C: Connector> ConnectionManager<C> {
    /// Starts the manager task. It connects immediately.
    ///
    /// Returns the handle, the event stream for the client loop, and the
    /// task's join handle.
    pub fn spawn(
        connector: C,
        config: ClientConfig,
    ) -> (
        ConnectionHandle,
        mpsc::Receiver<TransportEvent>,
        JoinHandle<()>,
    ) {
        let capacity = config.channel_capacity.max(1);
        let (cmd_tx, cmd_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());

        let manager = Self {
            connector,
            config,
            commands: cmd_rx,
            events: event_tx,
            state: state_tx,
            generation: 0,
        };
        let task = tokio::spawn(manager.run());

        let handle = ConnectionHandle {
            commands: cmd_tx,
            state: state_rx,
        };
        (handle, event_rx, task)
    }

    async fn run(mut self) {
        info!(url = %self.config.url, "connection manager started");
        let mut attempt = 0u32;

        loop {
            self.publish(|s| {
                s.status = ConnectionStatus::Connecting;
                s.reconnect_attempt = attempt;
            });

            match self.establish().await {
                Ok((conn, heartbeats)) => {
                    attempt = 0;
                    self.generation += 1;
                    let generation = self.generation;
                    self.publish(|s| {
                        s.status = ConnectionStatus::Connected;
                        s.reconnect_attempt = 0;
                        s.last_error = None;
                        s.generation = generation;
                    });
                    info!(generation, conn_id = %conn.id(), "connected to broker");
                    if self
                        .events
                        .send(TransportEvent::Connected { generation })
                        .await
                        .is_err()
                    {
                        let _ = conn.close().await;
                        break;
                    }

                    match self.serve(&conn, heartbeats).await {
                        Exit::Shutdown => {
                            let _ = conn.close().await;
                            break;
                        }
                        Exit::Lost(reason) => {
                            warn!(generation, %reason, "connection lost");
                            let _ = conn.close().await;
                            self.publish(|s| {
                                s.status = ConnectionStatus::Disconnected;
                                s.last_error = Some(reason);
                            });
                            let lost = TransportEvent::Disconnected { terminal: false };
                            if self.events.send(lost).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "connect attempt failed");
                    self.publish(|s| {
                        s.status = ConnectionStatus::Disconnected;
                        s.last_error = Some(e.to_string());
                    });
                    // No retry can fix a bad URL.
                    if matches!(e, TriviaError::Transport(TransportError::InvalidUrl(_))) {
                        break;
                    }
                }
            }

            if attempt >= self.config.max_reconnect_attempts {
                warn!(
                    attempts = attempt,
                    "reconnect budget exhausted, giving up"
                );
                break;
            }
            attempt += 1;
            self.publish(|s| s.reconnect_attempt = attempt);
            debug!(attempt, delay = ?self.config.reconnect_delay, "reconnecting after delay");
            if !self.backoff().await {
                break;
            }
        }

        self.publish(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.terminal = true;
        });
        let _ = self
            .events
            .send(TransportEvent::Disconnected { terminal: true })
            .await;
        info!("connection manager stopped");
    }

    /// Dials and completes the STOMP handshake within `connect_timeout`.
    async fn establish(
        &self,
    ) -> Result<(C::Connection, Heartbeats), TriviaError> {
        time::timeout(self.config.connect_timeout, self.handshake())
            .await
            .map_err(|_| TriviaError::Handshake("timed out".into()))?
    }

    async fn handshake(
        &self,
    ) -> Result<(C::Connection, Heartbeats), TriviaError> {
        let conn = self.connector.connect().await?;
        let ms = self.config.heartbeat_millis();
        let connect = Frame::connect(&self.config.stomp_host, (ms, ms));
        conn.send(&connect.encode()).await?;

        loop {
            let data = conn.recv().await?.ok_or_else(|| {
                TriviaError::Handshake("closed before CONNECTED".into())
            })?;
            let frame = match Frame::decode(&data)? {
                Decoded::Heartbeat => continue,
                Decoded::Frame(frame) => frame,
            };
            match frame.command {
                Command::Connected => {
                    let server = frame
                        .header("heart-beat")
                        .and_then(parse_heartbeat)
                        .unwrap_or((0, 0));
                    let (outgoing, incoming) = negotiate_heartbeat((ms, ms), server);
                    debug!(?outgoing, ?incoming, "heartbeats negotiated");
                    return Ok((conn, Heartbeats { outgoing, incoming }));
                }
                Command::Error => {
                    let message = frame.header("message").unwrap_or("broker error");
                    return Err(TriviaError::Handshake(message.to_string()));
                }
                other => {
                    return Err(TriviaError::Handshake(format!(
                        "expected CONNECTED, got {}",
                        other.as_str()
                    )));
                }
            }
        }
    }

    /// Pumps one live connection until it ends.
    async fn serve(&mut self, conn: &C::Connection, heartbeats: Heartbeats) -> Exit {
        let mut ping = heartbeats.outgoing.map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let silence_limit = heartbeats
            .incoming
            .map(|period| period * self.config.missed_heartbeats.max(1));
        let mut last_seen = Instant::now();

        loop {
            let deadline = silence_limit.map(|limit| last_seen + limit);

            tokio::select! {
                received = conn.recv() => {
                    let data = match received {
                        Ok(Some(data)) => data,
                        Ok(None) => return Exit::Lost("closed by broker".into()),
                        Err(e) => return Exit::Lost(e.to_string()),
                    };
                    last_seen = Instant::now();
                    match Frame::decode(&data) {
                        Ok(Decoded::Heartbeat) => trace!("heartbeat received"),
                        Ok(Decoded::Frame(frame)) => match frame.command {
                            Command::Message => {
                                if self.events.send(TransportEvent::Message(frame)).await.is_err() {
                                    return Exit::Shutdown;
                                }
                            }
                            Command::Error => {
                                let message = frame.header("message").unwrap_or("broker error");
                                return Exit::Lost(format!("broker error: {message}"));
                            }
                            other => debug!(command = other.as_str(), "frame ignored"),
                        },
                        Err(e) => warn!(error = %e, "undecodable frame dropped"),
                    }
                }
                _ = next_ping(&mut ping) => {
                    if let Err(e) = conn.send(HEARTBEAT).await {
                        return Exit::Lost(e.to_string());
                    }
                    trace!("heartbeat sent");
                }
                _ = sleep_until(deadline) => {
                    return Exit::Lost("heartbeat timeout".into());
                }
                command = self.commands.recv() => match command {
                    Some(ConnectionCommand::Send(frame)) => {
                        if let Err(e) = conn.send(&frame.encode()).await {
                            return Exit::Lost(e.to_string());
                        }
                    }
                    Some(ConnectionCommand::Disconnect) | None => {
                        info!("disconnecting");
                        let _ = conn.send(&Frame::disconnect().encode()).await;
                        return Exit::Shutdown;
                    }
                },
            }
        }
    }

    /// Waits out `reconnect_delay`. Returns `false` if told to stop instead.
    async fn backoff(&mut self) -> bool {
        let wake = time::sleep(self.config.reconnect_delay);
        tokio::pin!(wake);
        loop {
            tokio::select! {
                _ = &mut wake => return true,
                command = self.commands.recv() => match command {
                    Some(ConnectionCommand::Send(frame)) => {
                        debug!(command = frame.command.as_str(), "not connected, frame dropped");
                    }
                    Some(ConnectionCommand::Disconnect) | None => return false,
                },
            }
        }
    }

    fn publish(&self, update: impl FnOnce(&mut ConnectionState)) {
        self.state.send_modify(update);
    }
}

/// Next heartbeat tick; pends forever when outgoing heartbeats are off.
async fn next_ping(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Sleeps until `deadline`; pends forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
