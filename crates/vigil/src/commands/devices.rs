//! Device command handlers.

use tabled::Tabled;
use vigil_api::models::DeviceRecord;
use vigil_core::{Dashboard, DashboardConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    device_type: String,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(d: &DeviceRecord) -> Self {
        Self {
            name: d.name.clone(),
            device_type: d.device_type.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

pub async fn handle(config: DashboardConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let dashboard = Dashboard::new(config)?;
    let devices = dashboard.api().list_devices().await?;

    let out = output::render_list(
        &global.output,
        &devices,
        |d| DeviceRow::from(d),
        |d| d.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
