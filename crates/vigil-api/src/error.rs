use thiserror::Error;

/// Top-level error type for the `vigil-api` crate.
///
/// Covers the REST surface directly and wraps the broker-side
/// [`ConnectionError`] / [`SubscriptionError`] so callers that mix both can
/// use a single `?`. `vigil-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-2xx response. Carries the status and the response body text.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Broker ──────────────────────────────────────────────────────
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Connection(e) => e.is_transient(),
            _ => false,
        }
    }

    /// The HTTP status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Failure to establish a broker session.
///
/// `Clone` so that callers coalesced onto one in-flight connect attempt
/// each receive the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Broker refused the username/password pair or the client identity.
    #[error("Broker authentication failed: {message}")]
    Authentication { message: String },

    /// DNS, TCP, TLS, or WebSocket upgrade failure.
    #[error("Network failure reaching broker: {message}")]
    Network { message: String },

    /// The broker answered with something other than a valid CONNACK.
    #[error("Broker protocol failure: {message}")]
    Protocol { message: String },

    /// An explicit `disconnect()` overtook the attempt.
    #[error("Connection attempt cancelled by disconnect")]
    Cancelled,
}

impl ConnectionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Failure of a subscribe or unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// Called while the session is not in the `Connected` state.
    #[error("Not connected to broker (topic '{topic}')")]
    NotConnected { topic: String },

    /// The broker's SUBACK refused the topic.
    #[error("Broker rejected subscription to '{topic}'")]
    Rejected { topic: String },

    /// The request could not be delivered or acknowledged.
    #[error("Request for '{topic}' failed: {message}")]
    Transport { topic: String, message: String },
}
