//! Per-run execution context and confirmation seam.

use uuid::Uuid;

use crate::types::RunMode;

/// Flags shared by every component of a single run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: Uuid,
    mode: RunMode,
    allow_hard_delete: bool,
}

impl ExecutionContext {
    /// Context for a run that performs mutations.
    pub fn execute() -> Self {
        Self::new(RunMode::Execute)
    }

    /// Context for a run that only traces intended mutations.
    pub fn simulate() -> Self {
        Self::new(RunMode::Simulate)
    }

    pub fn new(mode: RunMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            allow_hard_delete: false,
        }
    }

    /// Opt in to destructive identity deletion.
    #[must_use]
    pub fn with_hard_delete(mut self, allow: bool) -> Self {
        self.allow_hard_delete = allow;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    #[must_use]
    pub fn is_simulate(&self) -> bool {
        self.mode == RunMode::Simulate
    }

    #[must_use]
    pub fn allow_hard_delete(&self) -> bool {
        self.allow_hard_delete
    }
}

/// Asks the operator to approve a destructive step.
pub trait Confirm: Send + Sync {
    /// Return `true` only on an explicit affirmative answer.
    fn confirm(&self, message: &str) -> bool;
}

/// A confirmer that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}
