//! Subcommand implementations

pub mod run;
pub mod verify;

use std::sync::Arc;

use offboard_core::audit::emit;
use offboard_core::{ActionRecord, ExecutionContext, ExitStatus, JsonLedger, Outcome};

use crate::config::{self, Config, Switches};
use crate::error::{CliError, CliResult};

const MODULE: &str = "config";

/// Open the ledger and load configuration from the process environment.
pub fn prepare(
    switches: Switches,
    startup: Option<CliError>,
    ctx: &ExecutionContext,
) -> CliResult<(Config, Arc<JsonLedger>)> {
    prepare_with(|key| std::env::var(key).ok(), switches, startup, ctx)
}

/// Open the ledger first, then load configuration through `lookup`.
///
/// `startup` carries an error raised before configuration could be read,
/// such as an unreadable env file. Either kind of failure is written to the
/// ledger before it is returned.
pub fn prepare_with<F>(
    lookup: F,
    switches: Switches,
    startup: Option<CliError>,
    ctx: &ExecutionContext,
) -> CliResult<(Config, Arc<JsonLedger>)>
where
    F: Fn(&str) -> Option<String>,
{
    let ledger = Arc::new(JsonLedger::open(config::ledger_path(&lookup))?);

    let loaded = match startup {
        Some(e) => Err(e),
        None => Config::from_lookup(&lookup, switches),
    };

    match loaded {
        Ok(config) => {
            tracing::info!(
                ledger = %ledger.path().display(),
                providers = ?config.providers(),
                "Configuration loaded"
            );
            Ok((config, ledger))
        }
        Err(e) => {
            emit(
                ledger.as_ref(),
                ActionRecord::new(ctx, MODULE, Outcome::Failure, "run refused before start")
                    .with_detail(e.to_string()),
            )?;
            Err(e)
        }
    }
}

pub(crate) fn finish(report: &offboard_core::RunReport) -> ExitStatus {
    crate::output::print(report);
    report.status
}
