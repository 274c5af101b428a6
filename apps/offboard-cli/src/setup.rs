//! Wires configuration into an orchestrator and a principal.

use std::sync::Arc;

use offboard_aws::{AwsCli, AwsIam, AwsSso};
use offboard_core::audit::emit;
use offboard_core::prelude::*;
use offboard_core::providers::{discover_instance, resolve_user_id};
use offboard_core::ActionRecord;
use offboard_github::{GitHubApi, GitHubClient};
use tracing::{info, instrument};

use crate::config::{Config, SsoTarget};
use crate::error::{CliError, CliResult};

const MODULE: &str = "setup";

/// What a command runs against.
pub struct Plan {
    pub orchestrator: Orchestrator,
    pub principal: Principal,
    /// Providers dropped during setup because the principal is not there.
    pub skipped: Vec<Provider>,
}

impl Plan {
    /// True when setup left nothing to run.
    pub fn is_empty(&self) -> bool {
        self.orchestrator.providers().is_empty()
    }
}

/// Build the orchestrator for `config`.
///
/// Failures of the external calls made during setup are recorded to `audit`
/// before they are returned.
#[instrument(skip_all, fields(run_id = %ctx.run_id()))]
pub async fn plan(
    config: &Config,
    audit: Arc<dyn AuditSink>,
    confirm: Arc<dyn Confirm>,
    ctx: &ExecutionContext,
) -> CliResult<Plan> {
    let mut principal = config.principal();
    let mut orchestrator = Orchestrator::new(Arc::clone(&audit), confirm);
    let mut skipped = Vec::new();

    if let Some(github) = &config.github {
        let client = GitHubClient::new(&github.api_url, github.token.clone())
            .map_err(|e| CliError::Validation(format!("{}: {e}", crate::config::GITHUB_API_URL)))?;
        let provider = SourceControlProvider::new(Arc::new(GitHubApi::new(client)), github.org.clone());
        orchestrator = orchestrator.with_module(ProviderModule::from_provider(Arc::new(provider)));
    }

    if !config.needs_aws() {
        return Ok(Plan {
            orchestrator,
            principal,
            skipped,
        });
    }

    let cli = AwsCli::new()
        .with_program(config.aws_program.clone())
        .with_profile(config.aws_profile.clone())
        .with_region(config.aws_region.clone());

    match cli.version().await {
        Ok(version) => info!(program = cli.program(), version = %version, "Found aws tool"),
        Err(e) => {
            let message = format!("aws pre-flight failed: {} is not usable", cli.program());
            record_failure(audit.as_ref(), ctx, &principal, &message, &ApiError::from(e))?;
            return Err(CliError::Preflight(message));
        }
    }

    if let Some(iam) = &config.iam {
        let mut provider = IamProvider::new(Arc::new(AwsIam::new(cli.clone())));
        if let Some(account) = &iam.expected_account {
            provider = provider.with_expected_account(account.clone());
        }
        orchestrator = orchestrator.with_module(ProviderModule::from_provider(Arc::new(provider)));
    }

    if let Some(target) = &config.sso {
        let api = Arc::new(AwsSso::new(cli));
        let instance = match discover_instance(api.as_ref()).await {
            Ok(instance) => instance,
            Err(e) => {
                let message = format!("{} pre-flight failed: SSO instance discovery", Provider::CloudSso);
                record_failure(audit.as_ref(), ctx, &principal, &message, &e)?;
                return Err(CliError::Preflight(format!("{message}: {e}")));
            }
        };
        info!(instance = %instance.instance_arn, "Using SSO instance");

        let user_id = match target {
            SsoTarget::UserId(id) => Some(id.clone()),
            SsoTarget::Email(email) => match resolve_user_id(api.as_ref(), &instance, email).await {
                Ok(Some(id)) => {
                    info!(email = %email, user_id = %id, "Resolved SSO user");
                    Some(id)
                }
                Ok(None) => {
                    emit(
                        audit.as_ref(),
                        ActionRecord::new(
                            ctx,
                            MODULE,
                            Outcome::Info,
                            format!("no {} user with email {email}, skipping", Provider::CloudSso),
                        )
                        .with_principal(principal.to_string()),
                    )?;
                    None
                }
                Err(e) => {
                    let message = format!("{} pre-flight failed: resolving {email}", Provider::CloudSso);
                    record_failure(audit.as_ref(), ctx, &principal, &message, &e)?;
                    return Err(CliError::Preflight(format!("{message}: {e}")));
                }
            },
        };

        match user_id {
            Some(id) => {
                principal = principal.with_sso_user_id(id);
                let provider = SsoProvider::new(api, instance);
                orchestrator =
                    orchestrator.with_module(ProviderModule::from_provider(Arc::new(provider)));
            }
            None => skipped.push(Provider::CloudSso),
        }
    }

    Ok(Plan {
        orchestrator,
        principal,
        skipped,
    })
}

fn record_failure(
    audit: &dyn AuditSink,
    ctx: &ExecutionContext,
    principal: &Principal,
    message: &str,
    cause: &ApiError,
) -> CliResult<()> {
    emit(
        audit,
        ActionRecord::new(ctx, MODULE, Outcome::Failure, message)
            .with_principal(principal.to_string())
            .with_detail(format!("{} {cause}", cause.error_code())),
    )?;
    Ok(())
}
