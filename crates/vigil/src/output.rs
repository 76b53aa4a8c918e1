//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one value per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};
use vigil_core::{EventRecord, Origin};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one value per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Yaml => render_yaml(data)?,
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views are
/// key/value listings rather than tables.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Yaml => render_yaml(data)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Event lines ──────────────────────────────────────────────────────

/// One line per event for streaming output.
///
/// Structured formats emit one compact document per event so the stream
/// stays line-delimited.
pub fn render_event(
    format: &OutputFormat,
    record: &EventRecord,
    color: bool,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => event_line(record, color),
        OutputFormat::Json | OutputFormat::JsonCompact => render_json(record, true)?,
        OutputFormat::Yaml => format!("---\n{}", render_yaml(record)?.trim_end()),
        OutputFormat::Plain => record.message.clone(),
    })
}

fn event_line(record: &EventRecord, color: bool) -> String {
    let when = record
        .instant()
        .map_or_else(|| record.timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
    let source = match (&record.device_name, record.origin) {
        (Some(name), _) => name.clone(),
        (None, origin) => origin.to_string(),
    };
    let door = door_label(record.door_open);

    if !color {
        return format!("{when}  {source:<16} {}{door}", record.message);
    }
    let source = match record.origin {
        Origin::System => source.magenta().to_string(),
        Origin::Device => source.cyan().to_string(),
        Origin::Unknown => source.dimmed().to_string(),
    };
    let door = match record.door_open {
        Some(true) => door.red().to_string(),
        _ => door.green().to_string(),
    };
    format!("{}  {source:<16} {}{door}", when.dimmed(), record.message.bold())
}

pub fn door_label(door_open: Option<bool>) -> &'static str {
    match door_open {
        Some(true) => " [open]",
        Some(false) => " [closed]",
        None => "",
    }
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
