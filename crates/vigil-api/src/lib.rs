//! Async transport layer for the vigil home-security dashboard.
//!
//! Two surfaces live here, both free of domain logic:
//!
//! - **[`broker`]**: a single long-lived publish/subscribe session
//!   ([`BrokerConnection`]) with coalesced connects, a single-shot automatic
//!   reconnect, and an observer registry for inbound messages and connection
//!   lifecycle events. The physical transport sits behind
//!   [`BrokerDialer`](broker::BrokerDialer); [`MqttDialer`](broker::MqttDialer)
//!   speaks MQTT over secure WebSockets.
//!
//! - **[`http`]**: the REST client ([`ApiClient`]) for the paginated log
//!   endpoint and the device / system-name / system-mode collaborators.
//!
//! `vigil-core` builds the event feed on top of both.

pub mod broker;
pub mod error;
pub mod http;
pub mod models;
pub mod transport;

pub use broker::{
    BrokerConfig, BrokerConnection, BrokerDialer, BrokerEndpoint, ConnectionEvent,
    ConnectionEventKind, ConnectionState, InboundMessage, ListenerHandle, MqttDialer, Payload, QoS,
    WeakBrokerConnection,
};
pub use error::{ConnectionError, Error, SubscriptionError};
pub use http::ApiClient;
pub use transport::{TlsMode, TransportConfig};
