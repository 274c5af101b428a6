//! Offboarding type definitions
//!
//! Enums shared by the grant model, the audit ledger and the exit taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An independent identity/authorization provider.
///
/// The declaration order is the fixed run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Source-control platform organization, teams and repositories.
    SourceControl,
    /// Cloud IAM user credentials, policies and groups.
    CloudIam,
    /// Cloud SSO identity assignments and groups.
    CloudSso,
}

impl Provider {
    /// All providers in run order.
    #[must_use]
    pub fn all() -> &'static [Provider] {
        &[Provider::SourceControl, Provider::CloudIam, Provider::CloudSso]
    }

    /// Get the string representation used in the ledger.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::SourceControl => "source_control",
            Provider::CloudIam => "cloud_iam",
            Provider::CloudSso => "cloud_sso",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "source_control" | "github" => Ok(Provider::SourceControl),
            "cloud_iam" | "iam" => Ok(Provider::CloudIam),
            "cloud_sso" | "sso" => Ok(Provider::CloudSso),
            _ => Err(ParseProviderError(s.to_string())),
        }
    }
}

/// Error parsing a provider from string.
#[derive(Debug, Clone)]
pub struct ParseProviderError(String);

impl fmt::Display for ParseProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid provider '{}', expected one of: source_control, cloud_iam, cloud_sso",
            self.0
        )
    }
}

impl std::error::Error for ParseProviderError {}

/// Kind of a single revocable unit of access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantKind {
    OrgMembership,
    TeamMembership,
    RepoCollaborator,
    SsoCredentialAuthorization,
    AccessKey,
    SigningCertificate,
    SshPublicKey,
    ServiceSpecificCredential,
    MfaDevice,
    LoginProfile,
    AttachedPolicy,
    InlinePolicy,
    GroupMembership,
    UserTag,
    PermissionSetAssignment,
    SsoGroupMembership,
    /// The identity itself (IAM user, SSO user).
    Identity,
}

impl GrantKind {
    /// Get the string representation used in the ledger.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::OrgMembership => "org-membership",
            GrantKind::TeamMembership => "team-membership",
            GrantKind::RepoCollaborator => "repo-collaborator",
            GrantKind::SsoCredentialAuthorization => "sso-credential-authorization",
            GrantKind::AccessKey => "access-key",
            GrantKind::SigningCertificate => "signing-cert",
            GrantKind::SshPublicKey => "ssh-public-key",
            GrantKind::ServiceSpecificCredential => "service-specific-credential",
            GrantKind::MfaDevice => "mfa-device",
            GrantKind::LoginProfile => "login-profile",
            GrantKind::AttachedPolicy => "attached-policy",
            GrantKind::InlinePolicy => "inline-policy",
            GrantKind::GroupMembership => "group-membership",
            GrantKind::UserTag => "user-tag",
            GrantKind::PermissionSetAssignment => "permission-set-assignment",
            GrantKind::SsoGroupMembership => "sso-group-membership",
            GrantKind::Identity => "identity",
        }
    }

    /// Whether revoking this grant irreversibly destroys the identity.
    ///
    /// Destructive grants require the hard-delete opt-in and an interactive
    /// confirmation outside simulate mode.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, GrantKind::Identity)
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the principal currently holds a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantStatus {
    Active,
    /// The target already lacks this grant.
    Absent,
}

/// Outcome of an attempted or simulated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
    Simulated,
    Info,
}

impl Outcome {
    /// Get the string representation used in the ledger.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Simulated => "SIMULATED",
            Outcome::Info => "INFO",
        }
    }

    /// Outcomes that may carry the simulate flag.
    #[must_use]
    pub fn is_simulatable(&self) -> bool {
        matches!(self, Outcome::Simulated | Outcome::Failure)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the principal exists at a provider at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Present,
    Absent,
}

/// Execution mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Execute,
    /// Trace intended actions without invoking mutating calls.
    Simulate,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Execute => write!(f, "execute"),
            RunMode::Simulate => write!(f, "simulate"),
        }
    }
}
