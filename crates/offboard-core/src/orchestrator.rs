//! Run orchestration
//!
//! Drives the enabled provider modules in fixed order, folds their outcomes
//! into one exit status and, outside simulate mode, hands over to the
//! [`Verifier`].

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::audit::{emit, AuditSink};
use crate::context::{Confirm, ExecutionContext};
use crate::error::{OffboardError, OffboardResult};
use crate::exit::{ExitStatus, RunOutcome};
use crate::gate::DryRunGate;
use crate::grant::Principal;
use crate::module::{ModuleReport, ProviderModule};
use crate::record::ActionRecord;
use crate::types::{Outcome, Provider, RunMode};
use crate::verifier::{VerificationReport, Verifier};

const MODULE: &str = "orchestrator";

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub modules: Vec<ModuleReport>,
    /// `None` when verification did not run.
    pub verification: Option<VerificationReport>,
    pub status: ExitStatus,
}

impl RunReport {
    fn halted(ctx: &ExecutionContext, status: ExitStatus) -> Self {
        Self {
            run_id: ctx.run_id(),
            mode: ctx.mode(),
            modules: Vec::new(),
            verification: None,
            status,
        }
    }

    /// Whether an independent verification pass confirmed the result.
    #[must_use]
    pub fn verified(&self) -> bool {
        self.verification.is_some()
    }
}

/// Runs provider modules and the verifier for one principal.
pub struct Orchestrator {
    modules: Vec<ProviderModule>,
    audit: Arc<dyn AuditSink>,
    gate: DryRunGate,
}

impl Orchestrator {
    pub fn new(audit: Arc<dyn AuditSink>, confirm: Arc<dyn Confirm>) -> Self {
        Self {
            modules: Vec::new(),
            gate: DryRunGate::new(Arc::clone(&audit), confirm),
            audit,
        }
    }

    /// Enable a provider module. Modules always run in provider order,
    /// whatever order they are added in.
    #[must_use]
    pub fn with_module(mut self, module: ProviderModule) -> Self {
        self.modules.retain(|m| m.provider() != module.provider());
        self.modules.push(module);
        self.modules.sort_by_key(ProviderModule::provider);
        self
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.modules.iter().map(ProviderModule::provider).collect()
    }

    /// Full deprovisioning run: validate, pre-flight, revoke, verify.
    pub async fn run(
        &self,
        principal: &Principal,
        ctx: &ExecutionContext,
    ) -> OffboardResult<RunReport> {
        info!(
            run_id = %ctx.run_id(),
            principal = %principal,
            mode = %ctx.mode(),
            hard_delete = ctx.allow_hard_delete(),
            "Run starting"
        );

        if let Some(report) = self.validate_and_preflight(principal, ctx).await? {
            return Ok(report);
        }

        self.note(
            ctx,
            principal,
            format!(
                "offboarding {} from {} ({} mode)",
                principal,
                join_providers(&self.providers()),
                ctx.mode()
            ),
        )?;

        let mut outcome = RunOutcome::new();
        let mut modules = Vec::with_capacity(self.modules.len());

        for module in &self.modules {
            let report = module.run(principal, ctx, &self.gate).await?;
            outcome.record(report.outcome.exit_status(module.provider()));
            modules.push(report);
        }

        let verification = if ctx.is_simulate() {
            self.note(ctx, principal, "simulate mode, verification skipped")?;
            None
        } else {
            let report = self.verifier().verify(principal, ctx).await?;
            outcome.record(report.exit_status());
            Some(report)
        };

        let status = outcome.status();
        let verified = if verification.is_some() { "verified" } else { "unverified" };
        self.note(ctx, principal, format!("run finished: {status}, {verified}"))?;
        info!(run_id = %ctx.run_id(), status = %status, "Run finished");

        Ok(RunReport {
            run_id: ctx.run_id(),
            mode: ctx.mode(),
            modules,
            verification,
            status,
        })
    }

    /// Standalone verification with no revoke pass.
    pub async fn verify(
        &self,
        principal: &Principal,
        ctx: &ExecutionContext,
    ) -> OffboardResult<RunReport> {
        if let Some(report) = self.validate_and_preflight(principal, ctx).await? {
            return Ok(report);
        }

        let verification = self.verifier().verify(principal, ctx).await?;
        let status = verification.exit_status();
        self.note(ctx, principal, format!("verification finished: {status}"))?;

        Ok(RunReport {
            run_id: ctx.run_id(),
            mode: ctx.mode(),
            modules: Vec::new(),
            verification: Some(verification),
            status,
        })
    }

    fn verifier(&self) -> Verifier {
        Verifier::new(
            self.modules.iter().map(ProviderModule::source).collect(),
            Arc::clone(&self.audit),
        )
    }

    /// Returns a halted report when the run must not proceed.
    async fn validate_and_preflight(
        &self,
        principal: &Principal,
        ctx: &ExecutionContext,
    ) -> OffboardResult<Option<RunReport>> {
        if let Err(e) = self.validate(principal) {
            return self.halt(ctx, principal, ExitStatus::Validation, &e).map(Some);
        }

        for module in &self.modules {
            if let Err(e) = module.source().preflight().await {
                return self.halt(ctx, principal, ExitStatus::Preflight, &e).map(Some);
            }
        }

        Ok(None)
    }

    fn validate(&self, principal: &Principal) -> OffboardResult<()> {
        if self.modules.is_empty() {
            return Err(OffboardError::validation("no provider is enabled"));
        }

        for module in &self.modules {
            if principal.identifier(module.provider()).is_none() {
                return Err(OffboardError::validation(format!(
                    "{} is enabled but {} has no identifier there",
                    module.provider(),
                    principal
                )));
            }
        }

        Ok(())
    }

    fn halt(
        &self,
        ctx: &ExecutionContext,
        principal: &Principal,
        status: ExitStatus,
        cause: &OffboardError,
    ) -> OffboardResult<RunReport> {
        error!(run_id = %ctx.run_id(), error = %cause, "Run halted before any revoke");
        emit(
            self.audit.as_ref(),
            ActionRecord::new(ctx, MODULE, Outcome::Failure, cause.to_string())
                .with_principal(principal.display_name()),
        )?;
        Ok(RunReport::halted(ctx, status))
    }

    fn note(
        &self,
        ctx: &ExecutionContext,
        principal: &Principal,
        message: impl Into<String>,
    ) -> OffboardResult<()> {
        emit(
            self.audit.as_ref(),
            ActionRecord::new(ctx, MODULE, Outcome::Info, message)
                .with_principal(principal.display_name()),
        )?;
        Ok(())
    }
}

fn join_providers(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(Provider::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
