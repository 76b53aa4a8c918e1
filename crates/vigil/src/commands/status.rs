//! System status handler.

use serde::Serialize;
use vigil_core::{Dashboard, DashboardConfig};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct StatusView {
    system_name: Option<String>,
    armed: bool,
    api: String,
    broker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    broker_state: Option<String>,
}

fn detail(s: &StatusView) -> String {
    let mut lines = vec![
        format!("System:   {}", s.system_name.as_deref().unwrap_or("-")),
        format!("Mode:     {}", if s.armed { "armed" } else { "disarmed" }),
        format!("Backend:  {}", s.api),
        format!("Broker:   {}", s.broker),
    ];
    if let Some(ref state) = s.broker_state {
        lines.push(format!("Session:  {state}"));
    }
    lines.join("\n")
}

pub async fn handle(
    config: DashboardConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let dashboard = Dashboard::new(config)?;
    let api = dashboard.api();
    let (system_name, mode) = tokio::try_join!(api.system_name(), api.system_mode())?;

    let broker_state = if args.broker {
        let state = match dashboard.connect().await {
            Ok(()) => dashboard.connection_state().to_string(),
            Err(e) => format!("unreachable ({e})"),
        };
        dashboard.shutdown().await;
        Some(state)
    } else {
        None
    };

    let view = StatusView {
        system_name,
        armed: mode.is_armed,
        api: api.base_url().to_string(),
        broker: dashboard.connection().endpoint().to_string(),
        broker_state,
    };
    let out = output::render_single(&global.output, &view, detail, |s| {
        String::from(if s.armed { "armed" } else { "disarmed" })
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
