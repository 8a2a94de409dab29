//! Command dispatch: bridges CLI args -> controller calls -> output.

pub mod status;
pub mod switch_cmd;

use lcolamps_core::SwitchController;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &SwitchController,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(controller, global).await,
        Command::On(args) => switch_cmd::handle_on(controller, args, global).await,
        Command::Off(args) => switch_cmd::handle_off(controller, args, global).await,
    }
}
