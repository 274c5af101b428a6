//! Audit ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::grant::Grant;
use crate::types::Outcome;

/// One append-only entry in the audit ledger.
///
/// `simulate` is only ever set on SIMULATED or FAILURE records of a
/// simulate run; [`ActionRecord::new`] enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    /// Emitting component: a provider name, "orchestrator" or "verifier".
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Grant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub outcome: Outcome,
    pub simulate: bool,
}

impl ActionRecord {
    pub fn new(
        ctx: &ExecutionContext,
        module: impl Into<String>,
        outcome: Outcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id: ctx.run_id(),
            module: module.into(),
            target: None,
            principal: None,
            message: message.into(),
            detail: None,
            outcome,
            simulate: ctx.is_simulate() && outcome.is_simulatable(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, grant: &Grant) -> Self {
        self.target = Some(grant.clone());
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
