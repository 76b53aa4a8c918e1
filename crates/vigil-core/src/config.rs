// ── Runtime dashboard configuration ──
//
// Describes where the backend and the broker live and how to talk to them.
// Carries credentials and tuning but never touches disk; the CLI builds a
// `DashboardConfig` from its profile and hands it in.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;
use vigil_api::{BrokerConfig, BrokerEndpoint, TlsMode, TransportConfig};

/// TLS verification strategy for the REST backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-hosted backend with a self-signed cert).
    DangerAcceptInvalid,
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl BrokerSettings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 8884,
            path: "/mqtt".into(),
            use_tls: true,
            username: None,
            password: None,
        }
    }
}

/// Everything a [`Dashboard`](crate::Dashboard) needs.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Backend root, e.g. `https://vigil.example.com`. Endpoints live under `/api/`.
    pub api_base_url: Url,
    pub broker: BrokerSettings,
    pub tls: TlsVerification,
    /// REST request timeout.
    pub timeout: Duration,
    /// Records requested per history page.
    pub page_size: u32,
    /// Delay before the single automatic broker reconnect.
    pub reconnect_delay: Duration,
    pub keep_alive: Duration,
    /// Device id → display name, layered over the built-in names.
    pub device_names: BTreeMap<String, String>,
}

impl DashboardConfig {
    pub fn new(api_base_url: Url, broker: BrokerSettings) -> Self {
        Self {
            api_base_url,
            broker,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            page_size: 6,
            reconnect_delay: Duration::from_secs(5),
            keep_alive: Duration::from_secs(60),
            device_names: BTreeMap::new(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }

    pub(crate) fn broker_config(&self) -> BrokerConfig {
        let endpoint = BrokerEndpoint {
            host: self.broker.host.clone(),
            port: self.broker.port,
            path: self.broker.path.clone(),
            use_tls: self.broker.use_tls,
        };
        let mut config = BrokerConfig::new(endpoint);
        config.username.clone_from(&self.broker.username);
        config.password.clone_from(&self.broker.password);
        config.keep_alive = self.keep_alive;
        config.reconnect_delay = self.reconnect_delay;
        config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_behavior() {
        let config = DashboardConfig::new(
            "https://vigil.example.com".parse().unwrap(),
            BrokerSettings::new("broker.example.com"),
        );
        assert_eq!(config.page_size, 6);
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));

        let broker = config.broker_config();
        assert_eq!(broker.endpoint.url(), "wss://broker.example.com:8884/mqtt");
        assert_eq!(broker.keep_alive, Duration::from_secs(60));
    }

    #[test]
    fn tls_verification_maps_to_transport() {
        let mut config = DashboardConfig::new(
            "https://vigil.example.com".parse().unwrap(),
            BrokerSettings::new("b"),
        );
        config.tls = TlsVerification::DangerAcceptInvalid;
        assert!(matches!(config.transport().tls, TlsMode::DangerAcceptInvalid));
    }
}
