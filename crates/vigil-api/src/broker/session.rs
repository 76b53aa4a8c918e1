// Physical broker transport seam.
//
// `BrokerConnection` owns lifecycle policy (coalescing, reconnect, the
// subscription set); a `BrokerDialer` only knows how to open one session
// and a `BrokerSession` how to use it until it dies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::SecretString;
use tokio::sync::mpsc;

use crate::error::{ConnectionError, SubscriptionError};

pub use rumqttc::QoS;

// ── Endpoint & configuration ────────────────────────────────────────

/// Where the broker listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    /// WebSocket path, `/mqtt` for most hosted brokers.
    pub path: String,
    /// `wss://` when true, `ws://` otherwise.
    pub use_tls: bool,
}

impl BrokerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: "/mqtt".into(),
            use_tls: true,
        }
    }

    /// Full WebSocket URL, e.g. `wss://broker.example.com:8884/mqtt`.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{scheme}://{}:{}{path}", self.host, self.port)
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Settings for a [`BrokerConnection`](super::BrokerConnection).
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub endpoint: BrokerEndpoint,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub keep_alive: Duration,
    /// Delay before the single automatic reconnect after a loss.
    pub reconnect_delay: Duration,
    /// Upper bound on CONNACK / SUBACK / UNSUBACK waits.
    pub ack_timeout: Duration,
}

impl BrokerConfig {
    pub fn new(endpoint: BrokerEndpoint) -> Self {
        Self {
            endpoint,
            username: None,
            password: None,
            keep_alive: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }
}

/// What a dialer needs to open one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub endpoint: BrokerEndpoint,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub keep_alive: Duration,
    pub ack_timeout: Duration,
}

// ── Session events ──────────────────────────────────────────────────

/// A message exactly as it came off the wire.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// Pushed by a live session to its owner, in transport order.
#[derive(Debug)]
pub enum SessionEvent {
    Message(RawMessage),
    /// The session died. No further events follow.
    Lost { reason: String },
}

/// A freshly opened session plus its event stream.
pub struct DialedSession {
    pub session: Arc<dyn BrokerSession>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

// ── Traits ──────────────────────────────────────────────────────────

/// Opens broker sessions.
#[async_trait]
pub trait BrokerDialer: Send + Sync {
    /// Dial and wait for the broker's acknowledgement.
    async fn dial(&self, options: &SessionOptions) -> Result<DialedSession, ConnectionError>;
}

/// One established broker session.
#[async_trait]
pub trait BrokerSession: Send + Sync {
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SubscriptionError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), SubscriptionError>;

    /// Hand a message to the transport without waiting.
    fn publish(&self, topic: &str, payload: Bytes, qos: QoS, retain: bool) -> Result<(), String>;

    /// Graceful close. Must not emit `SessionEvent::Lost`.
    async fn close(&self);
}
