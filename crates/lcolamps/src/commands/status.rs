//! Status command handler.

use lcolamps_core::SwitchController;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, StatusEntry};

pub async fn handle(controller: &SwitchController, global: &GlobalOpts) -> Result<(), CliError> {
    // Reconcile against the backends first so the report reflects the
    // hardware, not just the cache. A failed refresh degrades to the
    // cached (possibly Unknown) states.
    controller.refresh().await;

    let entries: Vec<StatusEntry> = controller
        .set()
        .iter()
        .map(|lamp| StatusEntry {
            name: lamp.name().to_string(),
            backend: lamp.backend().to_string(),
            state: lamp.state(),
        })
        .collect();

    let color = output::should_color(&global.color);
    output::print_output(
        &output::render_status(&global.output, color, &entries),
        global.quiet,
    );
    Ok(())
}
