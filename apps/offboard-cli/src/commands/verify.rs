use std::sync::Arc;

use clap::Args;
use offboard_core::{ExecutionContext, ExitStatus};

use crate::config::Switches;
use crate::error::{CliError, CliResult};
use crate::prompt::TerminalConfirm;
use crate::{output, setup};

/// Re-list every provider and report residual access, changing nothing
#[derive(Debug, Args)]
pub struct VerifyArgs {}

pub async fn execute(
    _args: VerifyArgs,
    switches: Switches,
    startup: Option<CliError>,
) -> CliResult<ExitStatus> {
    let ctx = ExecutionContext::execute();
    let (config, ledger) = super::prepare(switches, startup, &ctx)?;

    let plan = setup::plan(&config, ledger, Arc::new(TerminalConfirm), &ctx).await?;
    if plan.is_empty() {
        output::print_nothing_to_do(&plan.skipped);
        return Ok(ExitStatus::Success);
    }

    let report = plan.orchestrator.verify(&plan.principal, &ctx).await?;
    Ok(super::finish(&report))
}
