//! Principal and grant model.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{GrantKind, GrantStatus, Provider};

/// The identity being deprovisioned, identified per provider.
///
/// Built once before the run starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_control_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iam_user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sso_user_id: Option<String>,
}

impl Principal {
    /// Create a principal with no provider identifiers yet.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            source_control_login: None,
            iam_user_name: None,
            sso_user_id: None,
        }
    }

    /// Set the source-control handle.
    #[must_use]
    pub fn with_source_control_login(mut self, login: impl Into<String>) -> Self {
        self.source_control_login = Some(login.into());
        self
    }

    /// Set the cloud IAM user name.
    #[must_use]
    pub fn with_iam_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.iam_user_name = Some(user_name.into());
        self
    }

    /// Set the cloud SSO user id.
    #[must_use]
    pub fn with_sso_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.sso_user_id = Some(user_id.into());
        self
    }

    /// Human-readable name used in log messages.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The identifier this principal carries at a provider, if any.
    pub fn identifier(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::SourceControl => self.source_control_login.as_deref(),
            Provider::CloudIam => self.iam_user_name.as_deref(),
            Provider::CloudSso => self.sso_user_id.as_deref(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// A single revocable unit of access.
///
/// Grants are query results, re-derived on every listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub provider: Provider,
    pub kind: GrantKind,
    /// Team slug, repo name, key id, policy ARN, ...
    pub resource_id: String,
    /// Containing resource, e.g. the account an assignment targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub status: GrantStatus,
}

impl Grant {
    /// Create an active grant.
    pub fn active(provider: Provider, kind: GrantKind, resource_id: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            resource_id: resource_id.into(),
            scope: None,
            status: GrantStatus::Active,
        }
    }

    /// Create an absent grant.
    pub fn absent(provider: Provider, kind: GrantKind, resource_id: impl Into<String>) -> Self {
        Self {
            status: GrantStatus::Absent,
            ..Self::active(provider, kind, resource_id)
        }
    }

    /// Set the containing scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Whether the principal currently holds this grant.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == GrantStatus::Active
    }

    /// Scope or an error for kinds that are meaningless without one.
    pub(crate) fn require_scope(&self) -> crate::error::ApiResult<&str> {
        self.scope.as_deref().ok_or_else(|| {
            crate::error::ApiError::invalid_response(format!("{self} is missing its scope"))
        })
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(
                f,
                "{}:{}:{}/{}",
                self.provider, self.kind, scope, self.resource_id
            ),
            None => write!(f, "{}:{}:{}", self.provider, self.kind, self.resource_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_identifiers() {
        let principal = Principal::new("alice")
            .with_source_control_login("alice-gh")
            .with_iam_user_name("alice.smith");

        assert_eq!(
            principal.identifier(Provider::SourceControl),
            Some("alice-gh")
        );
        assert_eq!(principal.identifier(Provider::CloudIam), Some("alice.smith"));
        assert_eq!(principal.identifier(Provider::CloudSso), None);
        assert_eq!(principal.to_string(), "alice");
    }

    #[test]
    fn test_grant_display() {
        let grant = Grant::active(Provider::SourceControl, GrantKind::TeamMembership, "core");
        assert_eq!(grant.to_string(), "source_control:team-membership:core");

        let scoped = Grant::active(
            Provider::CloudSso,
            GrantKind::PermissionSetAssignment,
            "arn:aws:sso:::permissionSet/ssoins-1/ps-1",
        )
        .with_scope("111122223333");
        assert_eq!(
            scoped.to_string(),
            "cloud_sso:permission-set-assignment:111122223333/arn:aws:sso:::permissionSet/ssoins-1/ps-1"
        );
    }

    #[test]
    fn test_absent_grant() {
        let grant = Grant::absent(Provider::CloudIam, GrantKind::LoginProfile, "bob");
        assert!(!grant.is_active());
        assert_eq!(grant.status, GrantStatus::Absent);
    }

    #[test]
    fn test_require_scope() {
        let grant = Grant::active(Provider::CloudSso, GrantKind::PermissionSetAssignment, "ps");
        assert!(grant.require_scope().is_err());
        assert_eq!(grant.with_scope("acct").require_scope().unwrap(), "acct");
    }
}
