//! Event feed for the vigil home-security dashboard.
//!
//! This crate sits between `vigil-api` and the CLI and owns the data-plane
//! logic:
//!
//! - **[`Dashboard`]**: Facade that constructs the one [`BrokerConnection`],
//!   the REST client, and the components below, and wires them together.
//!
//! - **[`LiveEventNormalizer`]**: Subscribes to `system/logs` whenever the
//!   broker session comes up and turns each payload into an [`EventRecord`]
//!   held in a ring of the 50 most recent live events.
//!
//! - **[`HistoryLog`]**: Cursor-based pagination over `GET /api/logs` with
//!   `refresh()` / `load_more()` and an in-flight guard.
//!
//! - **[`FeedStore`]**: Holds both sources and recomputes the merged feed
//!   (dedup by id, newest first) on every mutation. Consumers read
//!   snapshots or subscribe through [`SnapshotStream`].
//!
//! - **[`CommandPublisher`]**: Fire-and-forget commands such as
//!   [`Command::SetMode`].
//!
//! [`BrokerConnection`]: vigil_api::BrokerConnection

pub mod command;
pub mod config;
mod convert;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod history;
pub mod live;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandPublisher};
pub use config::{BrokerSettings, DashboardConfig, TlsVerification};
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use history::{HistoryLog, LoadOutcome};
pub use live::{DecodeError, LIVE_TOPIC, LiveEventNormalizer};
pub use model::{DeviceDirectory, EventRecord, Origin, Timestamp};
pub use store::FeedStore;
pub use stream::SnapshotStream;
