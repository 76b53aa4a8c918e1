//! Command dispatch: bridges CLI args -> dashboard operations -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod logs;
pub mod mode;
pub mod rename;
pub mod status;
pub mod watch;

use vigil_core::DashboardConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: DashboardConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Logs(args) => logs::handle(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Arm => mode::handle(config, true, global).await,
        Command::Disarm => mode::handle(config, false, global).await,
        Command::Devices => devices::handle(config, global).await,
        Command::Status(args) => status::handle(config, args, global).await,
        Command::Rename(args) => rename::handle(config, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to backend dispatch".into(),
        )),
    }
}
