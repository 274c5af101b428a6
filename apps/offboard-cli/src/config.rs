//! Run configuration from the environment.
//!
//! A provider is enabled by configuring it; configuring it halfway is an
//! error rather than a silent skip.

use std::path::PathBuf;

use offboard_core::{Principal, Provider};
use offboard_github::DEFAULT_API_URL;
use secrecy::SecretString;

use crate::error::{CliError, CliResult};

pub const GITHUB_ORG: &str = "OFFBOARD_GITHUB_ORG";
pub const GITHUB_USER: &str = "OFFBOARD_GITHUB_USER";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const GITHUB_API_URL: &str = "OFFBOARD_GITHUB_API_URL";
pub const IAM_USER: &str = "OFFBOARD_IAM_USER";
pub const AWS_ACCOUNT_ID: &str = "OFFBOARD_AWS_ACCOUNT_ID";
pub const SSO_USER_ID: &str = "OFFBOARD_SSO_USER_ID";
pub const SSO_EMAIL: &str = "OFFBOARD_SSO_EMAIL";
pub const AWS_PROFILE: &str = "OFFBOARD_AWS_PROFILE";
pub const AWS_REGION: &str = "OFFBOARD_AWS_REGION";
pub const AWS_CLI: &str = "OFFBOARD_AWS_CLI";
pub const LEDGER: &str = "OFFBOARD_LEDGER";

pub const DEFAULT_LEDGER: &str = "offboard-ledger.json";
pub const DEFAULT_AWS_CLI: &str = "aws";

/// Ledger location from `lookup`, readable even when the rest of the
/// configuration is invalid.
pub fn ledger_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup(LEDGER)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER))
}

/// Providers switched off on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Switches {
    pub no_github: bool,
    pub no_iam: bool,
    pub no_sso: bool,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub org: String,
    pub user: String,
    pub token: SecretString,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct IamConfig {
    pub user_name: String,
    pub expected_account: Option<String>,
}

/// How the SSO identity is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsoTarget {
    UserId(String),
    /// Resolved to a user id before the run.
    Email(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub github: Option<GitHubConfig>,
    pub iam: Option<IamConfig>,
    pub sso: Option<SsoTarget>,
    pub aws_profile: Option<String>,
    pub aws_region: Option<String>,
    /// Program invoked for every AWS call.
    pub aws_program: String,
    pub ledger_path: PathBuf,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env(switches: Switches) -> CliResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), switches)
    }

    /// Load through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F, switches: Switches) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let github = if switches.no_github {
            None
        } else {
            github_config(&get)?
        };
        let iam = if switches.no_iam {
            None
        } else {
            iam_config(&get)?
        };
        let sso = if switches.no_sso {
            None
        } else {
            sso_target(&get)?
        };

        if github.is_none() && iam.is_none() && sso.is_none() {
            return Err(CliError::Validation(format!(
                "no provider is configured; set {GITHUB_ORG}, {IAM_USER} or {SSO_USER_ID}/{SSO_EMAIL}"
            )));
        }

        Ok(Self {
            github,
            iam,
            sso,
            aws_profile: get(AWS_PROFILE),
            aws_region: get(AWS_REGION),
            aws_program: get(AWS_CLI).unwrap_or_else(|| DEFAULT_AWS_CLI.to_string()),
            ledger_path: ledger_path(&lookup),
        })
    }

    /// Providers this configuration enables, in run order.
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers = Vec::new();
        if self.github.is_some() {
            providers.push(Provider::SourceControl);
        }
        if self.iam.is_some() {
            providers.push(Provider::CloudIam);
        }
        if self.sso.is_some() {
            providers.push(Provider::CloudSso);
        }
        providers
    }

    pub fn needs_aws(&self) -> bool {
        self.iam.is_some() || self.sso.is_some()
    }

    /// Principal with every identifier known before provider calls.
    ///
    /// An SSO email is not an identifier yet; it is resolved at setup.
    pub fn principal(&self) -> Principal {
        let display = self
            .github
            .as_ref()
            .map(|g| g.user.clone())
            .or_else(|| self.iam.as_ref().map(|i| i.user_name.clone()))
            .or_else(|| {
                self.sso.as_ref().map(|t| match t {
                    SsoTarget::UserId(id) | SsoTarget::Email(id) => id.clone(),
                })
            })
            .unwrap_or_default();

        let mut principal = Principal::new(display);
        if let Some(github) = &self.github {
            principal = principal.with_source_control_login(github.user.clone());
        }
        if let Some(iam) = &self.iam {
            principal = principal.with_iam_user_name(iam.user_name.clone());
        }
        if let Some(SsoTarget::UserId(id)) = &self.sso {
            principal = principal.with_sso_user_id(id.clone());
        }
        principal
    }
}

fn github_config(get: &impl Fn(&str) -> Option<String>) -> CliResult<Option<GitHubConfig>> {
    let org = get(GITHUB_ORG);
    let user = get(GITHUB_USER);
    let token = get(GITHUB_TOKEN);
    let api_url = get(GITHUB_API_URL);

    if org.is_none() && user.is_none() {
        // A token alone is common in CI environments and does not enable GitHub.
        if api_url.is_some() {
            return Err(partial("source control", &[GITHUB_ORG, GITHUB_USER]));
        }
        return Ok(None);
    }

    match (org, user, token) {
        (Some(org), Some(user), Some(token)) => Ok(Some(GitHubConfig {
            org,
            user,
            token: SecretString::new(token),
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })),
        (org, user, token) => {
            let missing: Vec<&str> = [
                (GITHUB_ORG, org.is_none()),
                (GITHUB_USER, user.is_none()),
                (GITHUB_TOKEN, token.is_none()),
            ]
            .into_iter()
            .filter_map(|(key, missing)| missing.then_some(key))
            .collect();
            Err(partial("source control", &missing))
        }
    }
}

fn iam_config(get: &impl Fn(&str) -> Option<String>) -> CliResult<Option<IamConfig>> {
    match (get(IAM_USER), get(AWS_ACCOUNT_ID)) {
        (Some(user_name), expected_account) => Ok(Some(IamConfig {
            user_name,
            expected_account,
        })),
        (None, Some(_)) => Err(partial("cloud IAM", &[IAM_USER])),
        (None, None) => Ok(None),
    }
}

fn sso_target(get: &impl Fn(&str) -> Option<String>) -> CliResult<Option<SsoTarget>> {
    match (get(SSO_USER_ID), get(SSO_EMAIL)) {
        (Some(_), Some(_)) => Err(CliError::Validation(format!(
            "set only one of {SSO_USER_ID} and {SSO_EMAIL}"
        ))),
        (Some(id), None) => Ok(Some(SsoTarget::UserId(id))),
        (None, Some(email)) => Ok(Some(SsoTarget::Email(email))),
        (None, None) => Ok(None),
    }
}

fn partial(provider: &str, missing: &[&str]) -> CliError {
    CliError::Validation(format!(
        "{provider} is partially configured, missing {}",
        missing.join(", ")
    ))
}
