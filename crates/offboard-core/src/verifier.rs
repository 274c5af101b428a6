//! Independent verification pass.
//!
//! The verifier only holds [`GrantSource`]s. It never sees revoke results,
//! so a delete call that reported success but left the grant in place still
//! shows up as residual access.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{emit, AuditSink};
use crate::context::ExecutionContext;
use crate::error::OffboardResult;
use crate::exit::ExitStatus;
use crate::grant::{Grant, Principal};
use crate::record::ActionRecord;
use crate::traits::GrantSource;
use crate::types::{GrantKind, Outcome, Provider};

const MODULE: &str = "verifier";

/// An active grant found after revocation was believed complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualFinding {
    pub grant: Grant,
}

/// Result of one verification pass.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub findings: Vec<ResidualFinding>,
    /// Providers whose enumeration failed, so clean cannot be proven.
    pub incomplete: Vec<Provider>,
    /// Identities that still exist but hold no other grant.
    pub lingering_identities: Vec<Grant>,
}

impl VerificationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.incomplete.is_empty()
    }

    #[must_use]
    /// Residual access outranks a failed re-list. A provider that could not
    /// be re-listed reports that provider's module failure code.
    pub fn exit_status(&self) -> ExitStatus {
        if !self.findings.is_empty() {
            return ExitStatus::ResidualAccess;
        }
        match self.incomplete.first() {
            Some(&provider) => ExitStatus::module_failed(provider),
            None => ExitStatus::Success,
        }
    }
}

/// Re-derives ground truth from every enabled provider.
pub struct Verifier {
    sources: Vec<Arc<dyn GrantSource>>,
    audit: Arc<dyn AuditSink>,
}

impl Verifier {
    pub fn new(mut sources: Vec<Arc<dyn GrantSource>>, audit: Arc<dyn AuditSink>) -> Self {
        sources.sort_by_key(|s| s.provider());
        Self { sources, audit }
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.sources.iter().map(|s| s.provider()).collect()
    }

    /// Re-list every provider and report anything still active.
    ///
    /// Works the same with or without a preceding revoke pass; with none,
    /// every active grant is residual by definition.
    pub async fn verify(
        &self,
        principal: &Principal,
        ctx: &ExecutionContext,
    ) -> OffboardResult<VerificationReport> {
        let mut report = VerificationReport::default();

        for source in &self.sources {
            let provider = source.provider();
            let grants = match source.list(principal).await {
                Ok(grants) => grants,
                Err(e) => {
                    report.incomplete.push(provider);
                    self.record(
                        ActionRecord::new(
                            ctx,
                            MODULE,
                            Outcome::Failure,
                            format!("could not re-list {provider}, residual access cannot be ruled out"),
                        )
                        .with_detail(format!("{} {e}", e.error_code())),
                        principal,
                    )?;
                    continue;
                }
            };

            let before = report.findings.len();
            for grant in grants.into_iter().filter(Grant::is_active) {
                if grant.kind == GrantKind::Identity {
                    self.record(
                        ActionRecord::new(
                            ctx,
                            MODULE,
                            Outcome::Info,
                            format!("identity {} still exists at {provider}", grant.resource_id),
                        )
                        .with_target(&grant),
                        principal,
                    )?;
                    report.lingering_identities.push(grant);
                    continue;
                }

                warn!(
                    provider = provider.as_str(),
                    kind = grant.kind.as_str(),
                    resource = %grant.resource_id,
                    "Residual access found"
                );
                self.record(
                    ActionRecord::new(
                        ctx,
                        MODULE,
                        Outcome::Failure,
                        format!("residual {} {} at {provider}", grant.kind, grant.resource_id),
                    )
                    .with_target(&grant),
                    principal,
                )?;
                report.findings.push(ResidualFinding { grant });
            }

            if report.findings.len() == before {
                self.record(
                    ActionRecord::new(
                        ctx,
                        MODULE,
                        Outcome::Info,
                        format!("no residual access at {provider}"),
                    ),
                    principal,
                )?;
            }
        }

        info!(
            findings = report.findings.len(),
            incomplete = report.incomplete.len(),
            "Verification finished"
        );

        Ok(report)
    }

    fn record(&self, record: ActionRecord, principal: &Principal) -> OffboardResult<()> {
        emit(
            self.audit.as_ref(),
            record.with_principal(principal.display_name()),
        )?;
        Ok(())
    }
}
