//! [`SourceControlApi`] over the GitHub REST API.

use async_trait::async_trait;
use offboard_core::providers::{CredentialAuthorization, Repository, SourceControlApi, Team};
use offboard_core::{ApiResult, Page};
use serde::Deserialize;

use crate::client::GitHubClient;
use crate::GitHubResult;

#[derive(Debug, Deserialize)]
struct UserDto {
    login: String,
}

#[derive(Debug, Deserialize)]
struct TeamDto {
    slug: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepoDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CredentialDto {
    login: String,
    credential_id: u64,
    credential_type: String,
}

/// GitHub-backed source-control capability.
#[derive(Debug)]
pub struct GitHubApi {
    client: GitHubClient,
}

impl GitHubApi {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    async fn page<T, D>(
        &self,
        cursor: Option<String>,
        segments: &[&str],
        query: &[(&str, &str)],
        convert: impl Fn(D) -> T + Send,
    ) -> GitHubResult<Page<T>>
    where
        D: serde::de::DeserializeOwned,
    {
        let url = match cursor {
            Some(cursor) => self.client.cursor_url(&cursor)?,
            None => self.client.first_page(segments, query)?,
        };
        let (items, next) = self.client.get_page::<D>(url).await?;
        Ok(Page {
            items: items.into_iter().map(convert).collect(),
            next,
        })
    }
}

#[async_trait]
impl SourceControlApi for GitHubApi {
    async fn authenticated_login(&self) -> ApiResult<String> {
        let url = self.client.endpoint(&["user"])?;
        let user: UserDto = self.client.get(url).await?;
        Ok(user.login)
    }

    async fn get_org_membership(&self, org: &str, user: &str) -> ApiResult<bool> {
        let url = self.client.endpoint(&["orgs", org, "memberships", user])?;
        Ok(self.client.probe(url).await?)
    }

    async fn remove_org_member(&self, org: &str, user: &str) -> ApiResult<()> {
        // The memberships endpoint also cancels pending invitations.
        let url = self.client.endpoint(&["orgs", org, "memberships", user])?;
        Ok(self.client.delete(url).await?)
    }

    async fn list_teams(&self, org: &str, cursor: Option<String>) -> ApiResult<Page<Team>> {
        let page = self
            .page(cursor, &["orgs", org, "teams"], &[], |t: TeamDto| Team {
                slug: t.slug,
                name: t.name,
            })
            .await?;
        Ok(page)
    }

    async fn get_team_membership(&self, org: &str, team_slug: &str, user: &str) -> ApiResult<bool> {
        let url = self
            .client
            .endpoint(&["orgs", org, "teams", team_slug, "memberships", user])?;
        Ok(self.client.probe(url).await?)
    }

    async fn remove_team_member(&self, org: &str, team_slug: &str, user: &str) -> ApiResult<()> {
        let url = self
            .client
            .endpoint(&["orgs", org, "teams", team_slug, "memberships", user])?;
        Ok(self.client.delete(url).await?)
    }

    async fn list_org_repos(&self, org: &str, cursor: Option<String>) -> ApiResult<Page<Repository>> {
        let page = self
            .page(
                cursor,
                &["orgs", org, "repos"],
                &[("type", "all")],
                |r: RepoDto| Repository { name: r.name },
            )
            .await?;
        Ok(page)
    }

    async fn get_repo_collaborator(&self, org: &str, repo: &str, user: &str) -> ApiResult<bool> {
        let url = self
            .client
            .endpoint(&["repos", org, repo, "collaborators", user])?;
        Ok(self.client.probe(url).await?)
    }

    async fn remove_repo_collaborator(&self, org: &str, repo: &str, user: &str) -> ApiResult<()> {
        let url = self
            .client
            .endpoint(&["repos", org, repo, "collaborators", user])?;
        Ok(self.client.delete(url).await?)
    }

    async fn list_sso_credential_authorizations(
        &self,
        org: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<CredentialAuthorization>> {
        let page = self
            .page(
                cursor,
                &["orgs", org, "credential-authorizations"],
                &[],
                |c: CredentialDto| CredentialAuthorization {
                    login: c.login,
                    credential_id: c.credential_id,
                    credential_type: c.credential_type,
                },
            )
            .await?;
        Ok(page)
    }

    async fn revoke_sso_credential(&self, org: &str, credential_id: u64) -> ApiResult<()> {
        let id = credential_id.to_string();
        let url = self
            .client
            .endpoint(&["orgs", org, "credential-authorizations", &id])?;
        Ok(self.client.delete(url).await?)
    }
}
