use std::sync::Arc;

use clap::Args;
use offboard_core::{ExecutionContext, ExitStatus, RunMode};

use crate::config::Switches;
use crate::error::{CliError, CliResult};
use crate::prompt::TerminalConfirm;
use crate::{output, setup};

/// Revoke every grant, then verify
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Enumerate and record what would be revoked without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Allow deleting user identities (asks for confirmation per identity)
    #[arg(long)]
    pub confirm_hard_delete: bool,
}

pub async fn execute(
    args: RunArgs,
    switches: Switches,
    startup: Option<CliError>,
) -> CliResult<ExitStatus> {
    let mode = if args.dry_run {
        RunMode::Simulate
    } else {
        RunMode::Execute
    };
    let ctx = ExecutionContext::new(mode).with_hard_delete(args.confirm_hard_delete);

    let (config, ledger) = super::prepare(switches, startup, &ctx)?;

    let plan = setup::plan(&config, ledger, Arc::new(TerminalConfirm), &ctx).await?;
    if plan.is_empty() {
        output::print_nothing_to_do(&plan.skipped);
        return Ok(ExitStatus::Success);
    }

    let report = plan.orchestrator.run(&plan.principal, &ctx).await?;
    Ok(super::finish(&report))
}
