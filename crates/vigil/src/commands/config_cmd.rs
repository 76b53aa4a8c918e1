//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let d = &cfg.defaults;
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", d.output);
    let _ = writeln!(out, "color = \"{}\"", d.color);
    let _ = writeln!(out, "insecure = {}", d.insecure);
    let _ = writeln!(out, "timeout = {}", d.timeout);
    let _ = writeln!(out, "page_size = {}", d.page_size);
    let _ = writeln!(out, "reconnect_delay_secs = {}", d.reconnect_delay_secs);
    let _ = writeln!(out, "keep_alive_secs = {}", d.keep_alive_secs);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "api_base_url = \"{}\"", p.api_base_url);
        let _ = writeln!(out, "broker_host = \"{}\"", p.broker_host);
        let _ = writeln!(out, "broker_port = {}", p.broker_port);
        let _ = writeln!(out, "broker_path = \"{}\"", p.broker_path);
        let _ = writeln!(out, "broker_tls = {}", p.broker_tls);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(page_size) = p.page_size {
            let _ = writeln!(out, "page_size = {page_size}");
        }
        if let Some(delay) = p.reconnect_delay_secs {
            let _ = writeln!(out, "reconnect_delay_secs = {delay}");
        }
        if let Some(keep_alive) = p.keep_alive_secs {
            let _ = writeln!(out, "keep_alive_secs = {keep_alive}");
        }
        if !p.device_names.is_empty() {
            let _ = writeln!(out, "\n[profiles.{name}.device_names]");
            for (id, label) in &p.device_names {
                let _ = writeln!(out, "{id} = \"{label}\"");
            }
        }
    }

    out
}

/// Config with secrets removed, for structured output formats.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("****".into());
        }
    }
    cfg
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn keyring_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "keyring".into(),
        reason: format!("failed to access keyring: {e}"),
    }
}

fn store_in_keyring(profile_name: &str, secret: &str) -> Result<(), CliError> {
    keyring::Entry::new(config::KEYRING_SERVICE, &config::keyring_account(profile_name))
        .and_then(|entry| entry.set_password(secret))
        .map_err(keyring_err)
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str, hint: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: hint.into(),
    })
}

/// Apply one `config set` assignment to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    let normalized = key.replace('-', "_");
    if let Some(device_id) = normalized.strip_prefix("device.") {
        if value.is_empty() {
            profile.device_names.remove(device_id);
        } else {
            profile.device_names.insert(device_id.to_owned(), value);
        }
        return Ok(());
    }

    match normalized.as_str() {
        "api_base_url" | "api_url" => {
            vigil_config::parse_base_url(&value)?;
            profile.api_base_url = value;
        }
        "broker_host" => profile.broker_host = value,
        "broker_port" => {
            profile.broker_port = parse_value("broker_port", &value, "must be a port number")?;
        }
        "broker_path" => profile.broker_path = value,
        "broker_tls" => {
            profile.broker_tls = parse_value("broker_tls", &value, "must be 'true' or 'false'")?;
        }
        "username" => profile.username = Some(value),
        "password_env" => profile.password_env = Some(value),
        "insecure" => {
            profile.insecure = Some(parse_value("insecure", &value, "must be 'true' or 'false'")?);
        }
        "timeout" => {
            profile.timeout = Some(parse_value("timeout", &value, "must be a number (seconds)")?);
        }
        "page_size" => {
            let size: u32 = parse_value("page_size", &value, "must be a positive number")?;
            if size == 0 {
                return Err(CliError::Validation {
                    field: "page_size".into(),
                    reason: "must be at least 1".into(),
                });
            }
            profile.page_size = Some(size);
        }
        "reconnect_delay_secs" => {
            profile.reconnect_delay_secs = Some(parse_value(
                "reconnect_delay_secs",
                &value,
                "must be a number (seconds)",
            )?);
        }
        "keep_alive_secs" => {
            profile.keep_alive_secs = Some(parse_value(
                "keep_alive_secs",
                &value,
                "must be a number (seconds)",
            )?);
        }
        "ca_cert" => profile.ca_cert = Some(value.into()),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: api_base_url, broker_host, \
                     broker_port, broker_path, broker_tls, username, password_env, insecure, \
                     timeout, page_size, reconnect_delay_secs, keep_alive_secs, ca_cert, \
                     device.<id>"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("vigil configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let api_base_url: String = Input::new()
                .with_prompt("Backend URL")
                .validate_with(|v: &String| {
                    vigil_config::parse_base_url(v)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()
                .map_err(prompt_err)?;

            let broker_host: String = Input::new()
                .with_prompt("Broker host")
                .interact_text()
                .map_err(prompt_err)?;

            let broker_port: u16 = Input::new()
                .with_prompt("Broker WebSocket port")
                .default(8884)
                .interact_text()
                .map_err(prompt_err)?;

            let username: String = Input::new()
                .with_prompt("Broker username (empty for anonymous)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;

            let mut password = None;
            if !username.is_empty() {
                let pass = rpassword::prompt_password("Broker password: ").map_err(prompt_err)?;
                if pass.is_empty() {
                    return Err(CliError::Validation {
                        field: "password".into(),
                        reason: "password cannot be empty".into(),
                    });
                }

                let choices = &[
                    "Store in system keyring (recommended)",
                    "Save to config file (plaintext)",
                ];
                let selection = Select::new()
                    .with_prompt("Where to store the password?")
                    .items(choices)
                    .default(0)
                    .interact()
                    .map_err(prompt_err)?;
                if selection == 0 {
                    store_in_keyring(&profile_name, &pass)?;
                    eprintln!("   ✓ Password stored in system keyring");
                } else {
                    password = Some(pass);
                }
            }

            let mut profile = Profile::new(api_base_url, broker_host);
            profile.broker_port = broker_port;
            profile.username = (!username.is_empty()).then_some(username);
            profile.password = password;

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: vigil status --broker");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(|| Profile::new(String::new(), String::new()));
            set_profile_key(profile, &key, value)?;

            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: vigil config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: config::available_profiles(&cfg),
                });
            }

            let secret = rpassword::prompt_password("Broker password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            store_in_keyring(&profile_name, &secret)?;

            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile::new("https://vigil.example.com", "mqtt.example.com")
    }

    #[test]
    fn set_accepts_dashed_and_typed_keys() {
        let mut p = profile();
        assert!(set_profile_key(&mut p, "broker-port", "443".into()).is_ok());
        assert!(set_profile_key(&mut p, "page_size", "10".into()).is_ok());
        assert!(set_profile_key(&mut p, "broker_tls", "false".into()).is_ok());
        assert_eq!(p.broker_port, 443);
        assert_eq!(p.page_size, Some(10));
        assert!(!p.broker_tls);
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut p = profile();
        assert!(set_profile_key(&mut p, "page_size", "0".into()).is_err());
        assert!(set_profile_key(&mut p, "broker_port", "huge".into()).is_err());
        assert!(set_profile_key(&mut p, "api_base_url", "nope".into()).is_err());
        assert!(set_profile_key(&mut p, "colour", "blue".into()).is_err());
        assert_eq!(p, profile());
    }

    #[test]
    fn device_names_can_be_set_and_cleared() {
        let mut p = profile();
        assert!(set_profile_key(&mut p, "device.d300", "Garage Door".into()).is_ok());
        assert_eq!(p.device_names["d300"], "Garage Door");
        assert!(set_profile_key(&mut p, "device.d300", String::new()).is_ok());
        assert!(p.device_names.is_empty());
    }

    #[test]
    fn redaction_masks_plaintext_password() {
        let mut cfg = Config::default();
        let mut p = profile();
        p.username = Some("dash".into());
        p.password = Some("hunter2".into());
        cfg.profiles.insert("home".into(), p);

        let text = format_config_redacted(&redacted(&cfg));
        assert!(text.contains("password = \"****\""));
        assert!(!text.contains("hunter2"));
    }
}
