//! Event log handler.

use std::sync::Arc;

use tabled::Tabled;
use vigil_core::{Dashboard, DashboardConfig, EventRecord};

use crate::cli::{GlobalOpts, LogsArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Origin")]
    origin: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Door")]
    door: String,
}

impl From<&Arc<EventRecord>> for EventRow {
    fn from(r: &Arc<EventRecord>) -> Self {
        Self {
            time: r.instant().map_or_else(
                || r.timestamp.to_string(),
                |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            origin: r.origin.to_string(),
            device: r
                .device_name
                .clone()
                .or_else(|| r.device_id.clone())
                .unwrap_or_else(|| "-".into()),
            message: r.message.clone(),
            door: match r.door_open {
                Some(true) => "open".into(),
                Some(false) => "closed".into(),
                None => String::new(),
            },
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    mut config: DashboardConfig,
    args: LogsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(limit) = args.limit {
        config.page_size = limit;
    }
    let dashboard = Dashboard::new(config)?;
    let history = dashboard.history();

    history.refresh().await?;
    let mut pages = 1;
    while history.has_more() && (args.all || pages < args.pages) {
        history.load_more().await?;
        pages += 1;
    }
    tracing::debug!(pages, has_more = history.has_more(), "history fetched");

    let feed = dashboard.store().feed();
    let out = output::render_list(
        &global.output,
        &feed,
        |r| EventRow::from(r),
        |r| r.message.clone(),
    )?;
    output::print_output(&out, global.quiet);

    if history.has_more() && matches!(global.output, OutputFormat::Table) && !global.quiet {
        eprintln!("More events available: use --pages N or --all");
    }
    Ok(())
}
