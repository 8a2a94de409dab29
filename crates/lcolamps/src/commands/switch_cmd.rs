//! On / off command handlers.

use std::time::Duration;

use lcolamps_core::{LampSelector, SwitchController, SwitchOutcome, SwitchRequest};

use crate::cli::{GlobalOpts, OffArgs, OnArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle_on(
    controller: &SwitchController,
    args: OnArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut request = SwitchRequest::on(targets(args.all, args.lamps));
    if let Some(secs) = args.warmup {
        let warmup = Duration::try_from_secs_f64(secs).map_err(|_| CliError::Validation {
            field: "warmup".into(),
            reason: format!("invalid duration in seconds: {secs}"),
        })?;
        request = request.with_warmup(warmup);
    }
    run(controller, request, global).await
}

pub async fn handle_off(
    controller: &SwitchController,
    args: OffArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    run(controller, SwitchRequest::off(targets(args.all, args.lamps)), global).await
}

fn targets(all: bool, lamps: Vec<String>) -> LampSelector {
    if all {
        LampSelector::All
    } else {
        LampSelector::Named(lamps)
    }
}

async fn run(
    controller: &SwitchController,
    request: SwitchRequest,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Reconcile first: lamps already in the target state at the
    // hardware are then skipped instead of re-commanded.
    controller.refresh().await;

    let result = controller.switch(request).await?;

    let color = output::should_color(&global.color);
    output::print_output(
        &output::render_switch(&global.output, color, &result),
        global.quiet,
    );

    if !result.all_ok() {
        let failed = result
            .outcomes
            .values()
            .filter(|o| matches!(o, SwitchOutcome::Failed(_)))
            .count();
        return Err(CliError::SwitchFailed {
            failed,
            total: result.outcomes.len(),
        });
    }
    Ok(())
}
