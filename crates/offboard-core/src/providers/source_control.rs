//! Source-control organization provider.
//!
//! Grants, in revoke order: team memberships, repository collaborator
//! grants, SSO credential authorizations, and finally the organization
//! membership itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult, OffboardResult};
use crate::grant::{Grant, Principal};
use crate::page::{collect_pages, Page};
use crate::traits::{GrantSource, Revoker};
use crate::types::{GrantKind, Presence, Provider};

use super::{identifier, preflight_failed};

const PROVIDER: Provider = Provider::SourceControl;

/// A team in the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub slug: String,
    pub name: String,
}

/// A repository owned by the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
}

/// A credential (token or SSH key) authorized for SAML SSO in the org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAuthorization {
    pub login: String,
    pub credential_id: u64,
    pub credential_type: String,
}

/// Raw source-control API surface.
///
/// `get_*` membership checks return `Ok(false)` when the user is not a
/// member; removals return [`ApiError::NotFound`] when there is nothing left
/// to remove.
#[async_trait]
pub trait SourceControlApi: Send + Sync {
    /// Login of the token's owner; used to validate credentials.
    async fn authenticated_login(&self) -> ApiResult<String>;

    async fn get_org_membership(&self, org: &str, user: &str) -> ApiResult<bool>;

    async fn remove_org_member(&self, org: &str, user: &str) -> ApiResult<()>;

    async fn list_teams(&self, org: &str, cursor: Option<String>) -> ApiResult<Page<Team>>;

    async fn get_team_membership(&self, org: &str, team_slug: &str, user: &str)
        -> ApiResult<bool>;

    async fn remove_team_member(&self, org: &str, team_slug: &str, user: &str) -> ApiResult<()>;

    async fn list_org_repos(&self, org: &str, cursor: Option<String>)
        -> ApiResult<Page<Repository>>;

    async fn get_repo_collaborator(&self, org: &str, repo: &str, user: &str) -> ApiResult<bool>;

    async fn remove_repo_collaborator(&self, org: &str, repo: &str, user: &str) -> ApiResult<()>;

    /// # Errors
    ///
    /// [`ApiError::NotFound`] when the organization does not use SAML SSO.
    async fn list_sso_credential_authorizations(
        &self,
        org: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<CredentialAuthorization>>;

    async fn revoke_sso_credential(&self, org: &str, credential_id: u64) -> ApiResult<()>;
}

/// Source-control provider scoped to one organization.
pub struct SourceControlProvider {
    api: Arc<dyn SourceControlApi>,
    org: String,
}

impl SourceControlProvider {
    pub fn new(api: Arc<dyn SourceControlApi>, org: impl Into<String>) -> Self {
        Self {
            api,
            org: org.into(),
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    async fn credential_authorizations(&self, user: &str) -> ApiResult<Vec<CredentialAuthorization>> {
        let api = self.api.as_ref();
        let org = self.org.as_str();
        let all = match collect_pages(move |cursor| api.list_sso_credential_authorizations(org, cursor))
            .await
        {
            Ok(all) => all,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(all
            .into_iter()
            .filter(|c| c.login.eq_ignore_ascii_case(user))
            .collect())
    }

    fn credential_id(grant: &Grant) -> ApiResult<u64> {
        grant.resource_id.parse().map_err(|_| {
            ApiError::invalid_response(format!("credential id {} is not numeric", grant.resource_id))
        })
    }
}

#[async_trait]
impl GrantSource for SourceControlProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn preflight(&self) -> OffboardResult<()> {
        self.api
            .authenticated_login()
            .await
            .map(|_| ())
            .map_err(|e| preflight_failed(PROVIDER, "token check failed", &e))
    }

    async fn presence(&self, principal: &Principal) -> ApiResult<Presence> {
        let user = identifier(principal, PROVIDER)?;
        if self.api.get_org_membership(&self.org, user).await? {
            Ok(Presence::Present)
        } else {
            Ok(Presence::Absent)
        }
    }

    async fn list(&self, principal: &Principal) -> ApiResult<Vec<Grant>> {
        let user = identifier(principal, PROVIDER)?;
        let api = self.api.as_ref();
        let org = self.org.as_str();
        let mut grants = Vec::new();

        let teams = collect_pages(move |cursor| api.list_teams(org, cursor)).await?;
        for team in teams {
            if api.get_team_membership(org, &team.slug, user).await? {
                grants.push(Grant::active(PROVIDER, GrantKind::TeamMembership, team.slug));
            }
        }

        let repos = collect_pages(move |cursor| api.list_org_repos(org, cursor)).await?;
        for repo in repos {
            if api.get_repo_collaborator(org, &repo.name, user).await? {
                grants.push(Grant::active(PROVIDER, GrantKind::RepoCollaborator, repo.name));
            }
        }

        for credential in self.credential_authorizations(user).await? {
            grants.push(
                Grant::active(
                    PROVIDER,
                    GrantKind::SsoCredentialAuthorization,
                    credential.credential_id.to_string(),
                )
                .with_scope(credential.credential_type),
            );
        }

        if api.get_org_membership(org, user).await? {
            grants.push(Grant::active(PROVIDER, GrantKind::OrgMembership, org));
        }

        Ok(grants)
    }
}

#[async_trait]
impl Revoker for SourceControlProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn describe(&self, principal: &Principal, grant: &Grant) -> String {
        let user = principal.identifier(PROVIDER).unwrap_or("-");
        match grant.kind {
            GrantKind::TeamMembership => {
                format!("remove {user} from team {}/{}", self.org, grant.resource_id)
            }
            GrantKind::RepoCollaborator => format!(
                "remove {user} as collaborator on {}/{}",
                self.org, grant.resource_id
            ),
            GrantKind::SsoCredentialAuthorization => format!(
                "revoke SSO authorization of {} credential {} for {user} in {}",
                grant.scope.as_deref().unwrap_or("unknown"),
                grant.resource_id,
                self.org
            ),
            GrantKind::OrgMembership => format!("remove {user} from organization {}", self.org),
            other => format!("revoke {other} {} for {user}", grant.resource_id),
        }
    }

    async fn is_present(&self, principal: &Principal, grant: &Grant) -> ApiResult<bool> {
        let user = identifier(principal, PROVIDER)?;
        match grant.kind {
            GrantKind::TeamMembership => {
                self.api
                    .get_team_membership(&self.org, &grant.resource_id, user)
                    .await
            }
            GrantKind::RepoCollaborator => {
                self.api
                    .get_repo_collaborator(&self.org, &grant.resource_id, user)
                    .await
            }
            GrantKind::SsoCredentialAuthorization => {
                let id = Self::credential_id(grant)?;
                Ok(self
                    .credential_authorizations(user)
                    .await?
                    .iter()
                    .any(|c| c.credential_id == id))
            }
            GrantKind::OrgMembership => self.api.get_org_membership(&self.org, user).await,
            other => Err(unsupported(other)),
        }
    }

    async fn apply(&self, principal: &Principal, grant: &Grant) -> ApiResult<()> {
        let user = identifier(principal, PROVIDER)?;
        match grant.kind {
            GrantKind::TeamMembership => {
                self.api
                    .remove_team_member(&self.org, &grant.resource_id, user)
                    .await
            }
            GrantKind::RepoCollaborator => {
                self.api
                    .remove_repo_collaborator(&self.org, &grant.resource_id, user)
                    .await
            }
            GrantKind::SsoCredentialAuthorization => {
                let id = Self::credential_id(grant)?;
                self.api.revoke_sso_credential(&self.org, id).await
            }
            GrantKind::OrgMembership => self.api.remove_org_member(&self.org, user).await,
            other => Err(unsupported(other)),
        }
    }
}

fn unsupported(kind: GrantKind) -> ApiError {
    ApiError::invalid_response(format!("{kind} is not a source control grant"))
}
