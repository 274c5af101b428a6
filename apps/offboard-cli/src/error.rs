//! CLI error types and exit codes

use offboard_core::{ExitStatus, OffboardError};
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

/// Errors that stop the binary before or outside a run.
///
/// Problems found during a run are reported through its
/// [`ExitStatus`](offboard_core::ExitStatus) instead.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Pre-flight failed: {0}")]
    Preflight(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.status().code()
    }

    /// The run taxonomy status this error corresponds to.
    pub fn status(&self) -> ExitStatus {
        match self {
            CliError::Validation(_) => ExitStatus::Validation,
            CliError::Preflight(_) => ExitStatus::Preflight,
            CliError::Ledger(_) | CliError::Internal(_) => ExitStatus::Internal,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Validation(_) => {
                Some("Check the OFFBOARD_* environment variables or the --env-file contents.")
            }
            CliError::Ledger(_) => {
                Some("Make sure no other offboard run holds the ledger lock file.")
            }
            _ => None,
        }
    }
}

impl From<OffboardError> for CliError {
    fn from(e: OffboardError) -> Self {
        match e {
            OffboardError::Validation { .. } => CliError::Validation(e.to_string()),
            OffboardError::Preflight { .. } => CliError::Preflight(e.to_string()),
            OffboardError::Audit { .. } => CliError::Ledger(e.to_string()),
            _ => CliError::Internal(e.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Internal(format!("I/O error: {}", e))
    }
}
