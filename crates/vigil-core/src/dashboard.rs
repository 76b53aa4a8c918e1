// ── Dashboard facade ──
//
// Constructs the single broker connection and the REST client, and wires
// the normalizer, history, store and command publisher around them.

use std::sync::Arc;

use tracing::{info, warn};
use vigil_api::{ApiClient, BrokerConnection, BrokerDialer, ConnectionState, MqttDialer};

use crate::command::{Command, CommandPublisher};
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::history::HistoryLog;
use crate::live::LiveEventNormalizer;
use crate::model::DeviceDirectory;
use crate::store::FeedStore;

/// Application context owning one broker session and the event feed.
pub struct Dashboard {
    config: DashboardConfig,
    connection: BrokerConnection,
    api: ApiClient,
    store: Arc<FeedStore>,
    directory: Arc<DeviceDirectory>,
    live: Arc<LiveEventNormalizer>,
    history: HistoryLog,
    commands: CommandPublisher,
}

impl Dashboard {
    /// Build a dashboard that reaches the broker over MQTT/WebSockets.
    pub fn new(config: DashboardConfig) -> Result<Self, CoreError> {
        Self::with_dialer(config, Arc::new(MqttDialer::default()))
    }

    /// Build a dashboard with a custom broker transport.
    pub fn with_dialer(
        config: DashboardConfig,
        dialer: Arc<dyn BrokerDialer>,
    ) -> Result<Self, CoreError> {
        let api = ApiClient::new(config.api_base_url.as_str(), &config.transport())?;
        let connection = BrokerConnection::new(config.broker_config(), dialer);

        let store = Arc::new(FeedStore::new());
        let directory = Arc::new(DeviceDirectory::with_overrides(&config.device_names));
        let live = LiveEventNormalizer::new(Arc::clone(&store), Arc::clone(&directory));
        live.attach(&connection);
        let history = HistoryLog::new(
            api.clone(),
            Arc::clone(&store),
            Arc::clone(&directory),
            config.page_size,
        );
        let commands = CommandPublisher::new(connection.clone());

        Ok(Self {
            config,
            connection,
            api,
            store,
            directory,
            live,
            history,
            commands,
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Connect to the broker and load the first history page concurrently.
    ///
    /// A history failure is logged and kept in [`HistoryLog::last_error`];
    /// only a broker failure is returned, since the feed stays usable
    /// without the live stream.
    pub async fn start(&self) -> Result<(), CoreError> {
        let (connected, refreshed) = tokio::join!(self.connection.connect(), self.history.refresh());
        if let Err(e) = refreshed {
            warn!(error = %e, "initial history load failed");
        }
        connected?;
        info!(
            client_id = self.connection.client_id(),
            endpoint = %self.connection.endpoint(),
            "dashboard started"
        );
        Ok(())
    }

    /// Connect to the broker only.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.connection.connect().await.map_err(CoreError::from)
    }

    /// Tear down the broker session and stop ingesting live events.
    pub async fn shutdown(&self) {
        self.live.detach();
        self.connection.disconnect().await;
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Publish an arm/disarm request. `false` means it was not sent.
    pub fn set_armed(&self, is_armed: bool) -> bool {
        self.commands.send(Command::SetMode { is_armed })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn connection(&self) -> &BrokerConnection {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &Arc<FeedStore> {
        &self.store
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    pub fn live(&self) -> &Arc<LiveEventNormalizer> {
        &self.live
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn commands(&self) -> &CommandPublisher {
        &self.commands
    }
}
