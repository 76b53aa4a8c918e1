//! CLI configuration: thin wrapper around `vigil_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --broker-host, etc.).

use vigil_core::DashboardConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use vigil_config::{
    Config, Defaults, KEYRING_SERVICE, Profile, config_path, keyring_account,
    load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names for error help text.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Build a `DashboardConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile the flags alone must name the backend and
/// the broker.
pub fn build_dashboard_config(global: &GlobalOpts) -> Result<DashboardConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => match (&global.api_url, &global.broker_host) {
            (Some(api_url), Some(broker_host)) => Profile::new(api_url, broker_host),
            _ => {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
        },
    };

    let profile = apply_overrides(profile, global);
    tracing::debug!(
        profile = %profile_name,
        api = %profile.api_base_url,
        broker = %profile.broker_host,
        "resolved profile"
    );
    Ok(vigil_config::profile_to_dashboard_config(
        &profile,
        &profile_name,
        &cfg.defaults,
    )?)
}

/// Layer flag values over a profile. Flags take priority.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref url) = global.api_url {
        profile.api_base_url.clone_from(url);
    }
    if let Some(ref host) = global.broker_host {
        profile.broker_host.clone_from(host);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    profile
}
