//! In-memory broker for integration tests.
//!
//! `MockBroker` is a [`Connector`]. Each `connect()` consumes one scripted
//! [`Behavior`] (or the fallback) and, unless refused, produces a
//! [`MockConnection`] whose broker side is a [`Link`] the test can inspect and
//! push frames through.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time::Instant;
use triviasync_protocol::{Command, Decoded, Frame, HEARTBEAT};
use triviasync_transport::{Connection, ConnectionId, Connector, TransportError};

/// How the broker treats one `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// The socket never opens.
    Refuse,
    /// Handshake succeeds with heartbeats disabled.
    Accept,
    /// Handshake succeeds asking for 4 s heartbeats, then nothing ever
    /// arrives.
    Silent,
    /// The broker answers `CONNECT` with an `ERROR` frame.
    Reject,
}

/// The broker side of one physical connection.
pub struct Link {
    pub id: ConnectionId,
    behavior: Behavior,
    sent: Mutex<Vec<Frame>>,
    heartbeats: AtomicU32,
    inbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    next_message: AtomicU32,
}

impl Link {
    /// Frames the client sent, heartbeats excluded.
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn heartbeats(&self) -> u32 {
        self.heartbeats.load(Ordering::SeqCst)
    }

    /// `SEND` bodies for `destination`, as strings.
    pub fn sends_to(&self, destination: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|f| f.command == Command::Send && f.header("destination") == Some(destination))
            .map(|f| String::from_utf8(f.body).unwrap())
            .collect()
    }

    pub fn count(&self, command: Command) -> usize {
        self.sent().iter().filter(|f| f.command == command).count()
    }

    /// Current subscription id per destination, replaying SUBSCRIBE and
    /// UNSUBSCRIBE in order.
    pub fn subscriptions(&self) -> HashMap<String, String> {
        let mut live = HashMap::new();
        for frame in self.sent() {
            match frame.command {
                Command::Subscribe => {
                    if let (Some(id), Some(dest)) = (frame.header("id"), frame.header("destination")) {
                        live.insert(dest.to_string(), id.to_string());
                    }
                }
                Command::Unsubscribe => {
                    if let Some(id) = frame.header("id") {
                        live.retain(|_, v| v != id);
                    }
                }
                _ => {}
            }
        }
        live
    }

    /// Pushes raw bytes to the client. `false` once the link is closed.
    pub fn push(&self, data: Vec<u8>) -> bool {
        match self.inbound.lock().unwrap().as_ref() {
            Some(tx) => tx.send(data).is_ok(),
            None => false,
        }
    }

    pub fn push_frame(&self, frame: Frame) -> bool {
        self.push(frame.encode())
    }

    /// Delivers `body` as a `MESSAGE` on `destination`, if the client is
    /// subscribed to it on this link.
    pub fn publish(&self, destination: &str, body: &str) -> bool {
        let Some(sub_id) = self.subscriptions().remove(destination) else {
            return false;
        };
        self.push_frame(self.message(&sub_id, destination, body))
    }

    /// A `MESSAGE` frame as the broker would build it.
    pub fn message(&self, sub_id: &str, destination: &str, body: &str) -> Frame {
        let n = self.next_message.fetch_add(1, Ordering::SeqCst);
        Frame::new(Command::Message)
            .with_header("subscription", sub_id)
            .with_header("destination", destination)
            .with_header("message-id", format!("m-{n}"))
            .with_body(body.as_bytes().to_vec())
    }

    /// Closes the broker side: the client's next `recv` sees end of stream.
    pub fn close(&self) {
        self.inbound.lock().unwrap().take();
    }

    pub fn is_closed(&self) -> bool {
        self.inbound.lock().unwrap().is_none()
    }
}

#[derive(Default)]
struct State {
    script: VecDeque<Behavior>,
    connects: Vec<Instant>,
    links: Vec<Arc<Link>>,
}

/// A scriptable broker.
#[derive(Clone)]
pub struct MockBroker {
    fallback: Behavior,
    state: Arc<Mutex<State>>,
}

impl MockBroker {
    pub fn new(fallback: Behavior) -> Self {
        Self {
            fallback,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Behaviors for the next `connect()` calls, in order.
    pub fn script(self, behaviors: impl IntoIterator<Item = Behavior>) -> Self {
        self.state.lock().unwrap().script.extend(behaviors);
        self
    }

    /// When each `connect()` was called.
    pub fn connects(&self) -> Vec<Instant> {
        self.state.lock().unwrap().connects.clone()
    }

    /// The most recent link.
    pub fn link(&self) -> Arc<Link> {
        self.state
            .lock()
            .unwrap()
            .links
            .last()
            .cloned()
            .expect("no connection yet")
    }

    pub fn links(&self) -> Vec<Arc<Link>> {
        self.state.lock().unwrap().links.clone()
    }
}

impl Connector for MockBroker {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(Instant::now());
        let behavior = state.script.pop_front().unwrap_or(self.fallback);
        if behavior == Behavior::Refuse {
            return Err(TransportError::ConnectFailed(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let link = Arc::new(Link {
            id: ConnectionId::next(),
            behavior,
            sent: Mutex::new(Vec::new()),
            heartbeats: AtomicU32::new(0),
            inbound: Mutex::new(Some(tx)),
            next_message: AtomicU32::new(0),
        });
        state.links.push(Arc::clone(&link));
        Ok(MockConnection {
            link,
            inbound: AsyncMutex::new(rx),
        })
    }
}

/// The client side of a mock link.
pub struct MockConnection {
    link: Arc<Link>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl Connection for MockConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.link.is_closed() {
            return Err(TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "closed",
            )));
        }
        if data == HEARTBEAT {
            self.link.heartbeats.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        let Ok(Decoded::Frame(frame)) = Frame::decode(data) else {
            return Ok(());
        };
        if frame.command == Command::Connect {
            let reply = match self.link.behavior {
                Behavior::Silent => Frame::new(Command::Connected)
                    .with_header("version", "1.2")
                    .with_header("heart-beat", "4000,4000"),
                Behavior::Reject => {
                    Frame::new(Command::Error).with_header("message", "bad credentials")
                }
                _ => Frame::new(Command::Connected)
                    .with_header("version", "1.2")
                    .with_header("heart-beat", "0,0"),
            };
            self.link.push_frame(reply);
        }
        self.link.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.link.close();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.link.id
    }
}

/// Lets every task run until the runtime is idle.
///
/// Tests run with paused time, so the sleep only completes once nothing else
/// can make progress.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
