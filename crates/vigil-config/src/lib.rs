//! Shared configuration for the vigil CLI.
//!
//! TOML profiles, broker credential resolution (env + keyring + plaintext),
//! and translation to `vigil_core::DashboardConfig`. The CLI layers its
//! flag overrides on top of what this crate resolves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use vigil_core::{BrokerSettings, DashboardConfig, TlsVerification};

/// Keyring service name under which broker passwords are stored.
pub const KEYRING_SERVICE: &str = "vigil";

/// Environment variable consulted for the broker password.
pub const PASSWORD_ENV: &str = "VIGIL_PASSWORD";

/// Environment variable consulted for the broker username.
pub const USERNAME_ENV: &str = "VIGIL_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no broker password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// REST request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Records per history page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            page_size: default_page_size(),
            reconnect_delay_secs: default_reconnect_delay(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_page_size() -> u32 {
    6
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_keep_alive() -> u64 {
    60
}

/// A named backend profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL (e.g., "https://vigil.example.com").
    pub api_base_url: String,

    /// Broker hostname.
    pub broker_host: String,

    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// WebSocket path on the broker.
    #[serde(default = "default_broker_path")]
    pub broker_path: String,

    /// `wss://` when true, `ws://` otherwise.
    #[serde(default = "default_broker_tls")]
    pub broker_tls: bool,

    /// Broker username.
    pub username: Option<String>,

    /// Broker password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the broker password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate for the backend.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override history page size.
    pub page_size: Option<u32>,

    pub reconnect_delay_secs: Option<u64>,

    pub keep_alive_secs: Option<u64>,

    /// Device id → display name, layered over the built-in names.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub device_names: BTreeMap<String, String>,
}

impl Profile {
    /// A profile pointing at `api_base_url` and `broker_host` with every
    /// other setting left at its default.
    pub fn new(api_base_url: impl Into<String>, broker_host: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            broker_host: broker_host.into(),
            broker_port: default_broker_port(),
            broker_path: default_broker_path(),
            broker_tls: default_broker_tls(),
            username: None,
            password: None,
            password_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            page_size: None,
            reconnect_delay_secs: None,
            keep_alive_secs: None,
            device_names: BTreeMap::new(),
        }
    }
}

fn default_broker_port() -> u16 {
    8884
}
fn default_broker_path() -> String {
    "/mqtt".into()
}
fn default_broker_tls() -> bool {
    true
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vigil", "vigil").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vigil");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources: built-in defaults, then the TOML file, then `VIGIL_`
/// environment variables. Nested keys use a double underscore, e.g.
/// `VIGIL_DEFAULTS__PAGE_SIZE=10`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIGIL_").split("__"))
}

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Keyring account under which a profile's broker password is stored.
pub fn keyring_account(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

/// Resolve broker credentials for a profile.
///
/// The username comes from the profile, then `VIGIL_USERNAME`. Without a
/// username the broker is used anonymously and `None` is returned. With
/// one, the password is looked up in order: the profile's `password_env`
/// variable, `VIGIL_PASSWORD`, the system keyring, the plaintext
/// `password` field.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<(String, SecretString)>, ConfigError> {
    resolve_credentials_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |account| {
            keyring::Entry::new(KEYRING_SERVICE, account)
                .and_then(|entry| entry.get_password())
                .ok()
        },
    )
}

fn resolve_credentials_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<Option<(String, SecretString)>, ConfigError> {
    let Some(username) = profile.username.clone().or_else(|| env(USERNAME_ENV)) else {
        return Ok(None);
    };

    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(Some((username, SecretString::from(pw))));
    }

    // 2. VIGIL_PASSWORD
    if let Some(pw) = env(PASSWORD_ENV) {
        return Ok(Some((username, SecretString::from(pw))));
    }

    // 3. System keyring
    if let Some(pw) = keyring(&keyring_account(profile_name)) {
        return Ok(Some((username, SecretString::from(pw))));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(Some((username, SecretString::from(pw.clone()))));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `DashboardConfig` from a profile, falling back to `defaults`
/// for every tunable the profile leaves unset. No CLI flag overrides.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let credentials = resolve_credentials(profile, profile_name)?;
    build_dashboard_config(profile, defaults, credentials)
}

fn build_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
    credentials: Option<(String, SecretString)>,
) -> Result<DashboardConfig, ConfigError> {
    let url = parse_base_url(&profile.api_base_url)?;

    if profile.broker_host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "broker_host".into(),
            reason: "must not be empty".into(),
        });
    }

    let page_size = profile.page_size.unwrap_or(defaults.page_size);
    if page_size == 0 {
        return Err(ConfigError::Validation {
            field: "page_size".into(),
            reason: "must be at least 1".into(),
        });
    }

    let (username, password) = credentials.map_or((None, None), |(u, p)| (Some(u), Some(p)));
    let broker = BrokerSettings {
        host: profile.broker_host.clone(),
        port: profile.broker_port,
        path: profile.broker_path.clone(),
        use_tls: profile.broker_tls,
        username,
        password,
    };

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = DashboardConfig::new(url, broker);
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.page_size = page_size;
    config.reconnect_delay = Duration::from_secs(
        profile
            .reconnect_delay_secs
            .unwrap_or(defaults.reconnect_delay_secs),
    );
    config.keep_alive =
        Duration::from_secs(profile.keep_alive_secs.unwrap_or(defaults.keep_alive_secs));
    config.device_names = profile.device_names.clone();
    Ok(config)
}

/// Parse and check a backend base URL.
pub fn parse_base_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "api_base_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_base_url".into(),
            reason: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn profile() -> Profile {
        let mut p = Profile::new("https://vigil.example.com", "broker.example.com");
        p.username = Some("dashboard".into());
        p
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn password(result: Option<(String, SecretString)>) -> String {
        result.unwrap().1.expose_secret().to_owned()
    }

    // ── Loading ─────────────────────────────────────────────────────

    #[test]
    fn file_and_env_layer_over_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "home"

                [defaults]
                timeout = 10

                [profiles.home]
                api_base_url = "https://home.example.com"
                broker_host = "mqtt.example.com"
                username = "dash"

                [profiles.home.device_names]
                d300 = "Garage Door"
                "#,
            )?;
            jail.set_env("VIGIL_DEFAULTS__PAGE_SIZE", "12");

            let cfg = load_config_from(Path::new("config.toml")).unwrap();

            assert_eq!(cfg.default_profile.as_deref(), Some("home"));
            assert_eq!(cfg.defaults.timeout, 10);
            assert_eq!(cfg.defaults.page_size, 12);
            assert_eq!(cfg.defaults.keep_alive_secs, 60);
            let home = &cfg.profiles["home"];
            assert_eq!(home.broker_port, 8884);
            assert_eq!(home.broker_path, "/mqtt");
            assert!(home.broker_tls);
            assert_eq!(home.device_names["d300"], "Garage Door");
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        figment::Jail::expect_with(|_jail| {
            let cfg = load_config_from(Path::new("absent.toml")).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        let mut p = profile();
        p.device_names.insert("d239".into(), "Front Door".into());
        cfg.profiles.insert("default".into(), p.clone());

        save_config_to(&cfg, &path).unwrap();
        let loaded: Config = Figment::new()
            .merge(Toml::file(&path))
            .extract()
            .unwrap();

        assert_eq!(loaded.profiles["default"], p);
    }

    // ── Credentials ─────────────────────────────────────────────────

    #[test]
    fn anonymous_without_username() {
        let p = Profile::new("https://vigil.example.com", "broker.example.com");
        let resolved = resolve_credentials_with(&p, "default", lookup(&[]), lookup(&[])).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn username_falls_back_to_env() {
        let p = Profile::new("https://vigil.example.com", "broker.example.com");
        let env = lookup(&[(USERNAME_ENV, "env-user"), (PASSWORD_ENV, "pw")]);
        let resolved = resolve_credentials_with(&p, "default", env, lookup(&[])).unwrap();
        assert_eq!(resolved.unwrap().0, "env-user");
    }

    #[test]
    fn password_env_wins_over_everything() {
        let mut p = profile();
        p.password_env = Some("HOME_BROKER_PW".into());
        p.password = Some("plaintext".into());
        let env = lookup(&[("HOME_BROKER_PW", "from-custom"), (PASSWORD_ENV, "from-vigil")]);
        let keyring = lookup(&[("home/password", "from-keyring")]);

        let resolved = resolve_credentials_with(&p, "home", env, keyring).unwrap();
        assert_eq!(password(resolved), "from-custom");
    }

    #[test]
    fn chain_order_after_password_env() {
        let mut p = profile();
        p.password_env = Some("UNSET_VAR".into());
        p.password = Some("plaintext".into());

        let both = resolve_credentials_with(
            &p,
            "home",
            lookup(&[(PASSWORD_ENV, "from-vigil")]),
            lookup(&[("home/password", "from-keyring")]),
        )
        .unwrap();
        assert_eq!(password(both), "from-vigil");

        let keyring_only = resolve_credentials_with(
            &p,
            "home",
            lookup(&[]),
            lookup(&[("home/password", "from-keyring")]),
        )
        .unwrap();
        assert_eq!(password(keyring_only), "from-keyring");

        let plaintext = resolve_credentials_with(&p, "home", lookup(&[]), lookup(&[])).unwrap();
        assert_eq!(password(plaintext), "plaintext");
    }

    #[test]
    fn username_without_password_is_an_error() {
        let err = resolve_credentials_with(&profile(), "home", lookup(&[]), lookup(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "home"));
    }

    // ── Translation ─────────────────────────────────────────────────

    #[test]
    fn profile_values_override_defaults() {
        let mut p = profile();
        p.timeout = Some(5);
        p.page_size = Some(20);
        p.broker_tls = false;
        p.device_names.insert("d239".into(), "Front Door".into());
        let creds = Some(("dash".to_owned(), SecretString::from("pw")));

        let cfg = build_dashboard_config(&p, &Defaults::default(), creds).unwrap();

        assert_eq!(cfg.api_base_url.as_str(), "https://vigil.example.com/");
        assert_eq!(cfg.broker.host, "broker.example.com");
        assert!(!cfg.broker.use_tls);
        assert_eq!(cfg.broker.username.as_deref(), Some("dash"));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.page_size, 20);
        assert_eq!(cfg.reconnect_delay, Duration::from_secs(5));
        assert_eq!(cfg.keep_alive, Duration::from_secs(60));
        assert_eq!(cfg.tls, TlsVerification::SystemDefaults);
        assert_eq!(cfg.device_names["d239"], "Front Door");
    }

    #[test]
    fn insecure_and_ca_cert_select_tls_mode() {
        let mut p = profile();
        p.ca_cert = Some("/etc/vigil/ca.pem".into());
        let cfg = build_dashboard_config(&p, &Defaults::default(), None).unwrap();
        assert_eq!(cfg.tls, TlsVerification::CustomCa("/etc/vigil/ca.pem".into()));

        let defaults = Defaults {
            insecure: true,
            ..Defaults::default()
        };
        let cfg = build_dashboard_config(&p, &defaults, None).unwrap();
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn invalid_profiles_are_rejected() {
        let mut bad_url = profile();
        bad_url.api_base_url = "not a url".into();
        assert!(matches!(
            build_dashboard_config(&bad_url, &Defaults::default(), None),
            Err(ConfigError::Validation { ref field, .. }) if field == "api_base_url"
        ));

        let mut ws_url = profile();
        ws_url.api_base_url = "wss://broker.example.com".into();
        assert!(build_dashboard_config(&ws_url, &Defaults::default(), None).is_err());

        let mut no_host = profile();
        no_host.broker_host = "  ".into();
        assert!(matches!(
            build_dashboard_config(&no_host, &Defaults::default(), None),
            Err(ConfigError::Validation { ref field, .. }) if field == "broker_host"
        ));

        let mut zero_page = profile();
        zero_page.page_size = Some(0);
        assert!(build_dashboard_config(&zero_page, &Defaults::default(), None).is_err());
    }
}
