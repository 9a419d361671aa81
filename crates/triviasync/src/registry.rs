//! Subscription registry.
//!
//! Maps logical topics to broker subscriptions and handlers. There is one
//! STOMP `SUBSCRIBE` per topic no matter how many handlers listen to it; the
//! broker-side id is regenerated for every connection generation, so inbound
//! frames from a superseded connection can never match.
//!
//! All operations are synchronous and take a short internal lock. Handlers
//! are always invoked after the lock is released, so a handler may subscribe
//! or unsubscribe without deadlocking.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use triviasync_protocol::{route, DomainEvent, Frame, Topic};

use crate::ConnectionHandle;

/// Callback invoked with every event routed from a topic.
///
/// Identity is pointer identity: subscribing the same `Arc` twice to one
/// topic registers it once.
pub type Handler = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Wraps a closure as a [`Handler`].
pub fn handler(f: impl Fn(&DomainEvent) + Send + Sync + 'static) -> Handler {
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct HandlerId(u64);

struct TopicEntry {
    topic: Topic,
    /// Broker subscription id for the current generation.
    sub_id: Option<String>,
    handlers: Vec<(HandlerId, Handler)>,
}

impl TopicEntry {
    fn is_active(&self) -> bool {
        self.sub_id.is_some()
    }
}

#[derive(Default)]
struct Inner {
    /// Keyed by topic path.
    topics: HashMap<String, TopicEntry>,
    /// `Some` while a connection generation is live.
    generation: Option<u64>,
    identity: Option<String>,
    next_handler: u64,
    next_sub: u64,
}

impl Inner {
    fn fresh_sub_id(&mut self) -> String {
        self.next_sub += 1;
        format!("sub-{}", self.next_sub)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Topic → handlers, kept in step with the live connection.
///
/// Cloning yields another reference to the same registry.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<Inner>>,
    connection: ConnectionHandle,
}

impl SubscriptionRegistry {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            connection,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Handlers never run under the lock.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers `handler` for `topic`.
    ///
    /// Returns a no-op handle, and logs a warning, when the topic is not one
    /// the broker publishes or when no connection is live.
    pub fn subscribe(&self, topic: &str, handler: Handler) -> Subscription {
        let Some(parsed) = Topic::parse(topic) else {
            warn!(%topic, "unknown topic, subscription ignored");
            return Subscription::noop(topic);
        };

        let mut inner = self.lock();
        if inner.generation.is_none() {
            warn!(%topic, "not connected, subscription ignored");
            return Subscription::noop(topic);
        }

        let path = parsed.path();
        if let Some(entry) = inner.topics.get(&path) {
            if let Some((id, _)) = entry
                .handlers
                .iter()
                .find(|(_, h)| Arc::ptr_eq(h, &handler))
            {
                debug!(%topic, "handler already subscribed");
                return self.handle(path, *id);
            }
        }

        inner.next_handler += 1;
        let id = HandlerId(inner.next_handler);

        if let Some(entry) = inner.topics.get_mut(&path) {
            entry.handlers.push((id, handler));
            debug!(%topic, handlers = entry.handlers.len(), "handler added");
            return self.handle(path, id);
        }

        let sub_id = inner.fresh_sub_id();
        let sent = self.connection.send(Frame::subscribe(&sub_id, &path));
        if !sent {
            warn!(%topic, "SUBSCRIBE not sent; will retry on reconnect");
        }
        info!(%topic, %sub_id, "subscribed");
        inner.topics.insert(
            path.clone(),
            TopicEntry {
                topic: parsed,
                sub_id: sent.then_some(sub_id),
                handlers: vec![(id, handler)],
            },
        );
        self.handle(path, id)
    }

    fn handle(&self, path: String, id: HandlerId) -> Subscription {
        Subscription {
            topic: path,
            target: Some((self.clone(), id)),
        }
    }

    fn remove(&self, path: &str, id: HandlerId) {
        let mut inner = self.lock();
        let Some(entry) = inner.topics.get_mut(path) else {
            return;
        };
        let before = entry.handlers.len();
        entry.handlers.retain(|(h, _)| *h != id);
        if entry.handlers.len() == before {
            return;
        }
        debug!(topic = path, handlers = entry.handlers.len(), "handler removed");
        if !entry.handlers.is_empty() {
            return;
        }

        if let Some(entry) = inner.topics.remove(path) {
            if let Some(sub_id) = entry.sub_id {
                self.connection.send(Frame::unsubscribe(&sub_id));
            }
            info!(topic = path, "unsubscribed");
        }
    }

    /// Sets the player name used to route player-scoped topics.
    pub fn set_identity(&self, identity: Option<String>) {
        self.lock().identity = identity;
    }

    /// A new connection generation is live: resubscribe every retained topic
    /// under fresh ids, keeping its handlers.
    pub fn on_connected(&self, generation: u64) {
        let mut inner = self.lock();
        inner.generation = Some(generation);

        let paths: Vec<String> = inner.topics.keys().cloned().collect();
        for path in &paths {
            let sub_id = inner.fresh_sub_id();
            let sent = self.connection.send(Frame::subscribe(&sub_id, path));
            if let Some(entry) = inner.topics.get_mut(path) {
                entry.sub_id = sent.then_some(sub_id);
            }
        }
        if !paths.is_empty() {
            info!(generation, topics = paths.len(), "resubscribed after reconnect");
        }
    }

    /// The live connection is gone.
    ///
    /// Non-terminal: topics stay registered but inactive until the next
    /// generation. Terminal: every subscription is dropped without invoking
    /// any handler.
    pub fn on_disconnected(&self, terminal: bool) {
        let mut inner = self.lock();
        inner.generation = None;
        if terminal {
            let dropped = inner.topics.len();
            inner.topics.clear();
            if dropped > 0 {
                info!(topics = dropped, "connection gone for good, subscriptions dropped");
            }
        } else {
            for entry in inner.topics.values_mut() {
                entry.sub_id = None;
            }
        }
    }

    /// Routes an inbound `MESSAGE` frame and invokes the topic's handlers.
    ///
    /// Frames for unknown or stale subscription ids are dropped. Bodies that
    /// fail to decode are logged and dropped. Returns how many handlers ran.
    pub fn dispatch(&self, frame: &Frame) -> usize {
        let Some(sub_id) = frame.header("subscription") else {
            debug!("MESSAGE without subscription header dropped");
            return 0;
        };

        let (topic, handlers, identity) = {
            let inner = self.lock();
            let Some(entry) = inner
                .topics
                .values()
                .find(|e| e.sub_id.as_deref() == Some(sub_id))
            else {
                debug!(%sub_id, "MESSAGE for stale subscription dropped");
                return 0;
            };
            let handlers: Vec<Handler> =
                entry.handlers.iter().map(|(_, h)| Arc::clone(h)).collect();
            (entry.topic.clone(), handlers, inner.identity.clone())
        };

        let event = match route(&topic, &frame.body, identity.as_deref()) {
            Ok(event) => event,
            Err(e) => {
                warn!(%topic, error = %e, "undecodable message dropped");
                return 0;
            }
        };
        debug!(%topic, ?event, "event routed");

        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    /// Whether a broker subscription for `topic` is live.
    pub fn is_active(&self, topic: &str) -> bool {
        Topic::parse(topic)
            .and_then(|t| self.lock().topics.get(&t.path()).map(TopicEntry::is_active))
            .unwrap_or(false)
    }

    /// Number of handlers registered for `topic`.
    pub fn handler_count(&self, topic: &str) -> usize {
        Topic::parse(topic)
            .and_then(|t| self.lock().topics.get(&t.path()).map(|e| e.handlers.len()))
            .unwrap_or(0)
    }

    /// Paths of every registered topic, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().topics.keys().cloned().collect();
        paths.sort();
        paths
    }
}

// ---------------------------------------------------------------------------
// Subscription handle
// ---------------------------------------------------------------------------

/// Returned by [`SubscriptionRegistry::subscribe`]. Dropping it does NOT
/// unsubscribe; call [`unsubscribe`](Self::unsubscribe).
pub struct Subscription {
    topic: String,
    target: Option<(SubscriptionRegistry, HandlerId)>,
}

impl Subscription {
    fn noop(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            target: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// `true` for handles that were never registered.
    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    /// Removes this handler. Idempotent; a no-op handle does nothing.
    ///
    /// A frame already being dispatched may still reach the handler once.
    pub fn unsubscribe(&self) {
        if let Some((registry, id)) = &self.target {
            registry.remove(&self.topic, *id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("noop", &self.is_noop())
            .finish()
    }
}
