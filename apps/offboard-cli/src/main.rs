//! offboard - deprovision a departing user and verify nothing remains
//!
//! Revokes the user's GitHub organization access, AWS IAM user, and AWS IAM
//! Identity Center assignments, writing every action to a JSON ledger.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use offboard_cli::commands::{run, verify};
use offboard_cli::config::Switches;
use offboard_cli::logging::{init_logging, LogFormat};
use offboard_cli::{CliError, CliResult};
use offboard_core::ExitStatus;

/// offboard - user deprovisioning and access verification
#[derive(Parser)]
#[command(name = "offboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Skip GitHub even if configured
    #[arg(long, global = true)]
    no_github: bool,

    /// Skip AWS IAM even if configured
    #[arg(long, global = true)]
    no_iam: bool,

    /// Skip AWS IAM Identity Center even if configured
    #[arg(long, global = true)]
    no_sso: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Revoke every grant, then verify
    Run(run::RunArgs),

    /// Report residual access without changing anything
    Verify(verify::VerifyArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let startup = load_env(cli.env_file.as_deref()).err();
    init_logging(cli.log_format);
    let result = execute(cli, startup).await;

    match result {
        Ok(status) => std::process::exit(status.code()),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

fn load_env(path: Option<&std::path::Path>) -> CliResult<()> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map_err(|e| CliError::Validation(format!("{}: {e}", path.display()))),
        None => {
            // A missing ./.env is normal.
            dotenvy::dotenv().ok();
            Ok(())
        }
    }
}

async fn execute(cli: Cli, startup: Option<CliError>) -> CliResult<ExitStatus> {
    let switches = Switches {
        no_github: cli.no_github,
        no_iam: cli.no_iam,
        no_sso: cli.no_sso,
    };
    match cli.command {
        Commands::Run(args) => run::execute(args, switches, startup).await,
        Commands::Verify(args) => verify::execute(args, switches, startup).await,
    }
}
