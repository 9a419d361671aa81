//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use triviasync_session::SessionConfig;

/// Default broker endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything the client needs to know before it dials the broker.
///
/// The defaults are the values the trivia broker is deployed with; most
/// callers only override `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker WebSocket URL.
    pub url: String,

    /// Value of the STOMP `host` header.
    pub stomp_host: String,

    /// How often we send a heartbeat, and how often we expect one.
    pub heartbeat_interval: Duration,

    /// Intervals of inbound silence before the connection is declared dead.
    pub missed_heartbeats: u32,

    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,

    /// Reconnect attempts after a drop before giving up for good.
    pub max_reconnect_attempts: u32,

    /// Upper bound on dialing plus the STOMP handshake.
    pub connect_timeout: Duration,

    /// How long a broker error stays on the session before it is cleared.
    pub error_display: Duration,

    /// Capacity of the command and transport channels.
    pub channel_capacity: usize,

    /// Game constants handed to every new session.
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            stomp_host: "localhost".to_string(),
            heartbeat_interval: Duration::from_secs(4),
            missed_heartbeats: 2,
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(10),
            error_display: Duration::from_secs(5),
            channel_capacity: 64,
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Default config pointed at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Heartbeat period in milliseconds, as sent in the `heart-beat` header.
    pub fn heartbeat_millis(&self) -> u64 {
        u64::try_from(self.heartbeat_interval.as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_broker_deployment() {
        let config = ClientConfig::default();
        assert_eq!(config.url, "ws://localhost:8080/ws");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(4));
        assert_eq!(config.heartbeat_millis(), 4000);
        assert_eq!(config.missed_heartbeats, 2);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.error_display, Duration::from_secs(5));
        assert_eq!(config.session.question_secs, 30);
    }

    #[test]
    fn test_with_url_keeps_other_defaults() {
        let config = ClientConfig::with_url("ws://trivia.example:9000/ws");
        assert_eq!(config.url, "ws://trivia.example:9000/ws");
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"url":"ws://10.0.0.2/ws","max_reconnect_attempts":3}"#)
                .unwrap();
        assert_eq!(config.url, "ws://10.0.0.2/ws");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
    }
}
