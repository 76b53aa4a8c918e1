//! Rename handlers for the system and its devices.

use vigil_core::{CoreError, Dashboard, DashboardConfig};

use crate::cli::{GlobalOpts, RenameArgs, RenameCommand};
use crate::error::CliError;

fn non_empty(field: &str, value: &str) -> Result<(), CliError> {
    if value.trim().is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

pub async fn handle(
    config: DashboardConfig,
    args: RenameArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let dashboard = Dashboard::new(config)?;
    let api = dashboard.api();

    match args.command {
        RenameCommand::System { name } => {
            non_empty("name", &name)?;
            api.rename_system(&name).await?;
            if !global.quiet {
                eprintln!("✓ System renamed to '{name}'");
            }
        }
        RenameCommand::Device { current, new_name } => {
            non_empty("new_name", &new_name)?;
            match api.rename_device(&current, &new_name).await.map_err(CoreError::from) {
                Ok(()) => {}
                Err(CoreError::Http { status: 404, .. }) => {
                    return Err(CliError::NotFound {
                        resource_type: "device".into(),
                        identifier: current,
                        list_command: "devices".into(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
            if !global.quiet {
                eprintln!("✓ Device '{current}' renamed to '{new_name}'");
            }
        }
    }
    Ok(())
}
