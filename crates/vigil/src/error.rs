//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vigil_config::ConfigError;
use vigil_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to {target}")]
    #[diagnostic(
        code(vigil::connection_failed),
        help(
            "{reason}\n\
             Check the broker host and port, or the backend URL, and try again."
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Not connected to the broker")]
    #[diagnostic(
        code(vigil::not_connected),
        help("The broker session dropped before the command could be sent. Try again.")
    )]
    NotConnected,

    #[error("Broker error: {message}")]
    #[diagnostic(code(vigil::broker))]
    Broker { message: String },

    #[error("Command '{command}' was not sent")]
    #[diagnostic(
        code(vigil::command_not_sent),
        help("The broker session is not connected. Run with -v to see connection logs.")
    )]
    CommandNotSent { command: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(vigil::auth_failed),
        help(
            "Verify the broker username and password.\n\
             Run: vigil config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No broker password configured for profile '{profile}'")]
    #[diagnostic(
        code(vigil::no_credentials),
        help(
            "Configure credentials with: vigil config init\n\
             Or set the VIGIL_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Backend ──────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(vigil::not_found),
        help("Run: vigil {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Backend returned HTTP {status}: {body}")]
    #[diagnostic(code(vigil::api_error))]
    Api { status: u16, body: String },

    #[error("Unexpected response from backend: {message}")]
    #[diagnostic(code(vigil::decode))]
    UnexpectedResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vigil::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vigil::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vigil config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(vigil::no_config),
        help(
            "Create one with: vigil config init\n\
             Expected at: {path}\n\
             Or pass --api-url and --broker-host."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(vigil::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out")]
    #[diagnostic(
        code(vigil::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON output: {0}")]
    #[diagnostic(code(vigil::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML output: {0}")]
    #[diagnostic(code(vigil::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(vigil::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected | Self::CommandNotSent { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { target, reason } => {
                CliError::ConnectionFailed { target, reason }
            }
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Protocol { message } => CliError::Broker { message },
            CoreError::Cancelled => CliError::Broker {
                message: "connection attempt cancelled".into(),
            },
            CoreError::NotConnected => CliError::NotConnected,
            CoreError::SubscriptionRejected { topic } => CliError::Broker {
                message: format!("subscription to '{topic}' rejected"),
            },
            CoreError::Http { status, body } => CliError::Api { status, body },
            CoreError::Timeout => CliError::Timeout,
            CoreError::Decode { message } => CliError::UnexpectedResponse { message },
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

impl From<vigil_api::Error> for CliError {
    fn from(err: vigil_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
