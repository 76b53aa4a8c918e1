//! Arm / disarm handlers.
//!
//! Commands are fire-and-forget: success means the broker session accepted
//! the publish, not that the backend changed mode.

use vigil_core::{Dashboard, DashboardConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(
    config: DashboardConfig,
    is_armed: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let action = if is_armed { "arm" } else { "disarm" };
    let dashboard = Dashboard::new(config)?;
    dashboard.connect().await?;

    let sent = dashboard.set_armed(is_armed);
    dashboard.shutdown().await;

    if !sent {
        return Err(CliError::CommandNotSent {
            command: action.into(),
        });
    }
    tracing::info!(is_armed, "mode command published");
    if !global.quiet {
        eprintln!("✓ {} request sent", if is_armed { "Arm" } else { "Disarm" });
    }
    Ok(())
}
