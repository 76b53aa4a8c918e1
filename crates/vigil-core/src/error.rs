// ── Core error types ──
//
// User-facing errors from vigil-core. Consumers never match on reqwest or
// rumqttc failures directly; the `From` impls below translate transport
// errors into domain variants.

use thiserror::Error;
use vigil_api::{ConnectionError, SubscriptionError};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Broker ───────────────────────────────────────────────────────
    #[error("Cannot connect to {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Broker protocol error: {message}")]
    Protocol { message: String },

    #[error("Connection attempt cancelled")]
    Cancelled,

    #[error("Not connected to the broker")]
    NotConnected,

    #[error("Broker rejected subscription to '{topic}'")]
    SubscriptionRejected { topic: String },

    // ── History ──────────────────────────────────────────────────────
    #[error("Request failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected response from server: {message}")]
    Decode { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout | Self::NotConnected => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vigil_api::Error> for CoreError {
    fn from(err: vigil_api::Error) -> Self {
        match err {
            vigil_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        target: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            vigil_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            vigil_api::Error::Tls(reason) => CoreError::ConnectionFailed {
                target: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            vigil_api::Error::Http { status, body } => CoreError::Http { status, body },
            vigil_api::Error::Deserialization { message, body: _ } => {
                CoreError::Decode { message }
            }
            vigil_api::Error::Connection(e) => e.into(),
            vigil_api::Error::Subscription(e) => e.into(),
        }
    }
}

impl From<ConnectionError> for CoreError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ConnectionError::Network { message } => CoreError::ConnectionFailed {
                target: "broker".into(),
                reason: message,
            },
            ConnectionError::Protocol { message } => CoreError::Protocol { message },
            ConnectionError::Cancelled => CoreError::Cancelled,
        }
    }
}

impl From<SubscriptionError> for CoreError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::NotConnected { .. } => CoreError::NotConnected,
            SubscriptionError::Rejected { topic } => CoreError::SubscriptionRejected { topic },
            SubscriptionError::Transport { topic, message } => CoreError::ConnectionFailed {
                target: format!("topic '{topic}'"),
                reason: message,
            },
        }
    }
}
