//! Process exit taxonomy.

use serde::Serialize;
use std::fmt;

use crate::types::Provider;

/// Terminal status of a run, each mapped to a disjoint exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    /// Unexpected internal error, e.g. the ledger is unwritable.
    Internal,
    Validation,
    Preflight,
    SourceControlFailed,
    CloudIamFailed,
    CloudSsoFailed,
    ResidualAccess,
}

impl ExitStatus {
    /// Process exit code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Internal => 1,
            ExitStatus::Validation => 2,
            ExitStatus::Preflight => 3,
            ExitStatus::SourceControlFailed => 10,
            ExitStatus::CloudIamFailed => 11,
            ExitStatus::CloudSsoFailed => 12,
            ExitStatus::ResidualAccess => 20,
        }
    }

    /// Module failure status for a provider.
    #[must_use]
    pub fn module_failed(provider: Provider) -> Self {
        match provider {
            Provider::SourceControl => ExitStatus::SourceControlFailed,
            Provider::CloudIam => ExitStatus::CloudIamFailed,
            Provider::CloudSso => ExitStatus::CloudSsoFailed,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        *self == ExitStatus::Success
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitStatus::Success => "success",
            ExitStatus::Internal => "internal error",
            ExitStatus::Validation => "configuration invalid",
            ExitStatus::Preflight => "pre-flight failed",
            ExitStatus::SourceControlFailed => "source control module failed",
            ExitStatus::CloudIamFailed => "cloud IAM module failed",
            ExitStatus::CloudSsoFailed => "cloud SSO module failed",
            ExitStatus::ResidualAccess => "residual access detected",
        };
        write!(f, "{label} (exit {})", self.code())
    }
}

/// Aggregates statuses: the first non-success status wins and is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    status: ExitStatus,
}

impl Default for RunOutcome {
    fn default() -> Self {
        Self {
            status: ExitStatus::Success,
        }
    }
}

impl RunOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one status. A later success never downgrades a failure.
    pub fn record(&mut self, status: ExitStatus) {
        if self.status.is_success() {
            self.status = status;
        }
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }
}
