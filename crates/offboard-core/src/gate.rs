//! Dry-run gate
//!
//! The single point every mutation passes through. In simulate mode the gate
//! records the intended action and never reaches the revoker.

use std::sync::Arc;

use crate::audit::{emit, AuditSink};
use crate::context::{Confirm, ExecutionContext};
use crate::error::OffboardResult;
use crate::grant::{Grant, Principal};
use crate::record::ActionRecord;
use crate::traits::{RevokeStatus, Revoker};
use crate::types::Outcome;

/// Result of passing one grant through the gate.
#[derive(Debug, Clone)]
pub struct RevokeResult {
    /// Whether a mutating call was actually made.
    pub applied: bool,
    pub outcome: Outcome,
    pub record: ActionRecord,
}

impl RevokeResult {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }
}

/// Wraps every revoke call with simulate, hard-delete and audit handling.
#[derive(Clone)]
pub struct DryRunGate {
    audit: Arc<dyn AuditSink>,
    confirm: Arc<dyn Confirm>,
}

impl DryRunGate {
    pub fn new(audit: Arc<dyn AuditSink>, confirm: Arc<dyn Confirm>) -> Self {
        Self { audit, confirm }
    }

    pub fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    /// Revoke one grant, or record what would have been revoked.
    ///
    /// Only an audit write failure is returned as an error; revoke failures
    /// become FAILURE records.
    pub async fn revoke(
        &self,
        ctx: &ExecutionContext,
        revoker: &dyn Revoker,
        principal: &Principal,
        grant: &Grant,
    ) -> OffboardResult<RevokeResult> {
        let module = revoker.provider().as_str();
        let description = revoker.describe(principal, grant);

        let base = |outcome: Outcome, message: String| {
            ActionRecord::new(ctx, module, outcome, message)
                .with_target(grant)
                .with_principal(principal.display_name())
        };

        if grant.kind.is_destructive() && !ctx.allow_hard_delete() {
            let record = base(
                Outcome::Info,
                format!("{description}: skipped, hard delete not enabled"),
            );
            return self.finish(false, record);
        }

        if ctx.is_simulate() {
            return self.finish(false, base(Outcome::Simulated, description));
        }

        let (applied, record) = match revoker.revoke(principal, grant, self.confirm.as_ref()).await {
            Ok(RevokeStatus::Applied) => (true, base(Outcome::Success, description)),
            Ok(RevokeStatus::AlreadyAbsent) => (
                false,
                base(Outcome::Info, format!("{description}: already absent")),
            ),
            Ok(RevokeStatus::Declined) => (
                false,
                base(Outcome::Info, format!("{description}: declined at confirmation")),
            ),
            Err(e) => (
                false,
                base(Outcome::Failure, format!("{description}: failed"))
                    .with_detail(format!("{} {e}", e.error_code())),
            ),
        };

        self.finish(applied, record)
    }

    fn finish(&self, applied: bool, record: ActionRecord) -> OffboardResult<RevokeResult> {
        let record = emit(self.audit.as_ref(), record)?;
        Ok(RevokeResult {
            applied,
            outcome: record.outcome,
            record,
        })
    }
}
