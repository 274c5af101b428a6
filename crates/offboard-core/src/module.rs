//! Provider module
//!
//! One polymorphic `ENUMERATE -> (REVOKE)* -> DONE` pass over a
//! [`GrantSource`]/[`Revoker`] pair. Every provider runs through the same
//! control flow; only the capability implementations differ.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit::emit;
use crate::context::ExecutionContext;
use crate::error::{OffboardError, OffboardResult};
use crate::exit::ExitStatus;
use crate::gate::{DryRunGate, RevokeResult};
use crate::grant::{Grant, Principal};
use crate::record::ActionRecord;
use crate::traits::{GrantSource, Revoker};
use crate::types::{Outcome, Presence, Provider};

/// Module-level outcome reported to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutcome {
    Ok,
    /// At least one grant failed to revoke; the rest were still processed.
    PartialFailure { failed: usize },
    /// Enumeration failed, so no revoke was attempted.
    Aborted { reason: String },
}

impl ModuleOutcome {
    /// Exit status contribution of this outcome.
    #[must_use]
    pub fn exit_status(&self, provider: Provider) -> ExitStatus {
        match self {
            ModuleOutcome::Ok => ExitStatus::Success,
            ModuleOutcome::PartialFailure { .. } | ModuleOutcome::Aborted { .. } => {
                ExitStatus::module_failed(provider)
            }
        }
    }
}

/// Result for one visited grant.
#[derive(Debug, Clone)]
pub struct GrantResult {
    pub grant: Grant,
    pub description: String,
    pub result: RevokeResult,
}

/// Everything one module pass produced.
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub provider: Provider,
    pub outcome: ModuleOutcome,
    pub results: Vec<GrantResult>,
}

impl ModuleReport {
    /// Number of mutating calls that were actually made.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.results.iter().filter(|r| r.result.applied).count()
    }
}

/// A grant source and revoker for one provider.
#[derive(Clone)]
pub struct ProviderModule {
    provider: Provider,
    source: Arc<dyn GrantSource>,
    revoker: Arc<dyn Revoker>,
}

impl ProviderModule {
    pub fn new(source: Arc<dyn GrantSource>, revoker: Arc<dyn Revoker>) -> Self {
        Self {
            provider: source.provider(),
            source,
            revoker,
        }
    }

    /// Build a module from one value implementing both capabilities.
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: GrantSource + Revoker + 'static,
    {
        Self::new(provider.clone(), provider)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The read side, shared with the verifier.
    pub fn source(&self) -> Arc<dyn GrantSource> {
        Arc::clone(&self.source)
    }

    /// Enumerate and revoke every grant the principal holds at this provider.
    ///
    /// Returns an error only when the audit sink fails.
    pub async fn run(
        &self,
        principal: &Principal,
        ctx: &ExecutionContext,
        gate: &DryRunGate,
    ) -> OffboardResult<ModuleReport> {
        let module = self.provider.as_str();
        info!(provider = module, principal = %principal, mode = %ctx.mode(), "Module starting");

        match self.source.presence(principal).await {
            Ok(Presence::Present) => {}
            Ok(Presence::Absent) => {
                let who = principal.identifier(self.provider).unwrap_or("-");
                emit(
                    gate.audit(),
                    ActionRecord::new(
                        ctx,
                        module,
                        Outcome::Info,
                        format!("{who} not found at {module}, continuing with grant cleanup"),
                    )
                    .with_principal(principal.display_name()),
                )?;
            }
            Err(e) => {
                let error = OffboardError::enumeration(self.provider, e);
                return self.abort(principal, ctx, gate, "presence check", error);
            }
        }

        let grants = match self.source.list(principal).await {
            Ok(grants) => grants,
            Err(e) => {
                let error = OffboardError::enumeration(self.provider, e);
                return self.abort(principal, ctx, gate, "enumeration", error);
            }
        };
        debug!(provider = module, count = grants.len(), "Enumerated grants");

        let mut results = Vec::with_capacity(grants.len());
        let mut failed = 0;

        for grant in grants.into_iter().filter(Grant::is_active) {
            let description = self.revoker.describe(principal, &grant);
            let result = gate
                .revoke(ctx, self.revoker.as_ref(), principal, &grant)
                .await?;
            if result.is_failure() {
                failed += 1;
            }
            results.push(GrantResult {
                grant,
                description,
                result,
            });
        }

        let outcome = if failed == 0 {
            ModuleOutcome::Ok
        } else {
            ModuleOutcome::PartialFailure { failed }
        };

        info!(
            provider = module,
            visited = results.len(),
            failed,
            outcome = ?outcome,
            "Module finished"
        );

        Ok(ModuleReport {
            provider: self.provider,
            outcome,
            results,
        })
    }

    fn abort(
        &self,
        principal: &Principal,
        ctx: &ExecutionContext,
        gate: &DryRunGate,
        stage: &str,
        error: OffboardError,
    ) -> OffboardResult<ModuleReport> {
        let module = self.provider.as_str();
        warn!(provider = module, stage, error = %error, "Module aborted");

        emit(
            gate.audit(),
            ActionRecord::new(
                ctx,
                module,
                Outcome::Failure,
                format!("{stage} failed, no grants revoked at {module}"),
            )
            .with_principal(principal.display_name())
            .with_detail(error.to_string()),
        )?;

        Ok(ModuleReport {
            provider: self.provider,
            outcome: ModuleOutcome::Aborted {
                reason: error.to_string(),
            },
            results: Vec::new(),
        })
    }
}
