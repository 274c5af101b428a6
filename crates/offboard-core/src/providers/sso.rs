//! Cloud SSO identity provider.
//!
//! Permission-set assignments are discovered by walking every account and
//! every permission set provisioned to it, then filtering assignments down to
//! the principal. Group memberships follow, then the identity itself.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult, OffboardError, OffboardResult};
use crate::grant::{Grant, Principal};
use crate::page::{collect_pages, Page};
use crate::traits::{GrantSource, Revoker};
use crate::types::{GrantKind, Presence, Provider};

use super::{identifier, preflight_failed};

const PROVIDER: Provider = Provider::CloudSso;

/// An SSO instance and its backing identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoInstance {
    pub instance_arn: String,
    pub identity_store_id: String,
}

/// One account assignment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAssignment {
    pub account_id: String,
    pub permission_set_arn: String,
    /// `USER` or `GROUP`.
    pub principal_type: String,
    pub principal_id: String,
}

impl AccountAssignment {
    /// Whether this row assigns the given user directly.
    pub fn is_user(&self, user_id: &str) -> bool {
        self.principal_type.eq_ignore_ascii_case("USER") && self.principal_id == user_id
    }
}

/// A user's membership in an identity-store group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoGroupMembership {
    pub membership_id: String,
    pub group_id: String,
}

/// Raw cloud SSO API surface.
#[async_trait]
pub trait SsoApi: Send + Sync {
    async fn list_instances(&self) -> ApiResult<Vec<SsoInstance>>;

    /// `Ok(None)` when no user has that email.
    async fn resolve_user_id_by_email(
        &self,
        identity_store_id: &str,
        email: &str,
    ) -> ApiResult<Option<String>>;

    /// Whether the user exists in the identity store.
    async fn describe_user(&self, identity_store_id: &str, user_id: &str) -> ApiResult<bool>;

    /// Ids of every account in the organization.
    async fn list_accounts(&self, cursor: Option<String>) -> ApiResult<Page<String>>;

    async fn list_permission_sets_provisioned_to_account(
        &self,
        instance_arn: &str,
        account_id: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>>;

    async fn list_account_assignments(
        &self,
        instance_arn: &str,
        account_id: &str,
        permission_set_arn: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<AccountAssignment>>;

    async fn delete_account_assignment(
        &self,
        instance_arn: &str,
        assignment: &AccountAssignment,
    ) -> ApiResult<()>;

    async fn list_group_memberships_for_member(
        &self,
        identity_store_id: &str,
        user_id: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<SsoGroupMembership>>;

    async fn delete_group_membership(
        &self,
        identity_store_id: &str,
        membership_id: &str,
    ) -> ApiResult<()>;

    async fn delete_user(&self, identity_store_id: &str, user_id: &str) -> ApiResult<()>;
}

/// Find the SSO instance to operate on.
///
/// Organizations have at most one instance; the first listed one is used.
pub async fn discover_instance(api: &dyn SsoApi) -> ApiResult<SsoInstance> {
    api.list_instances()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("SSO instance"))
}

/// Resolve a user id from an email before the run starts.
pub async fn resolve_user_id(
    api: &dyn SsoApi,
    instance: &SsoInstance,
    email: &str,
) -> ApiResult<Option<String>> {
    api.resolve_user_id_by_email(&instance.identity_store_id, email)
        .await
}

/// Cloud SSO provider bound to one instance.
pub struct SsoProvider {
    api: Arc<dyn SsoApi>,
    instance: SsoInstance,
}

impl SsoProvider {
    pub fn new(api: Arc<dyn SsoApi>, instance: SsoInstance) -> Self {
        Self { api, instance }
    }

    pub fn instance(&self) -> &SsoInstance {
        &self.instance
    }

    async fn assignments(
        &self,
        user_id: &str,
        account_id: &str,
        permission_set_arn: &str,
    ) -> ApiResult<Vec<AccountAssignment>> {
        let api = self.api.as_ref();
        let instance_arn = self.instance.instance_arn.as_str();
        let rows = collect_pages(move |c| {
            api.list_account_assignments(instance_arn, account_id, permission_set_arn, c)
        })
        .await?;
        Ok(rows.into_iter().filter(|a| a.is_user(user_id)).collect())
    }

    async fn memberships(&self, user_id: &str) -> ApiResult<Vec<SsoGroupMembership>> {
        let api = self.api.as_ref();
        let store = self.instance.identity_store_id.as_str();
        collect_pages(move |c| api.list_group_memberships_for_member(store, user_id, c)).await
    }

    fn assignment_for(grant: &Grant, user_id: &str) -> ApiResult<AccountAssignment> {
        Ok(AccountAssignment {
            account_id: grant.require_scope()?.to_string(),
            permission_set_arn: grant.resource_id.clone(),
            principal_type: "USER".to_string(),
            principal_id: user_id.to_string(),
        })
    }
}

#[async_trait]
impl GrantSource for SsoProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn preflight(&self) -> OffboardResult<()> {
        let instances = self
            .api
            .list_instances()
            .await
            .map_err(|e| preflight_failed(PROVIDER, "instance lookup failed", &e))?;

        if instances
            .iter()
            .any(|i| i.instance_arn == self.instance.instance_arn)
        {
            Ok(())
        } else {
            Err(OffboardError::preflight(
                PROVIDER,
                format!("SSO instance {} is not visible", self.instance.instance_arn),
            ))
        }
    }

    async fn presence(&self, principal: &Principal) -> ApiResult<Presence> {
        let user_id = identifier(principal, PROVIDER)?;
        if self
            .api
            .describe_user(&self.instance.identity_store_id, user_id)
            .await?
        {
            Ok(Presence::Present)
        } else {
            Ok(Presence::Absent)
        }
    }

    async fn list(&self, principal: &Principal) -> ApiResult<Vec<Grant>> {
        let user_id = identifier(principal, PROVIDER)?;
        let api = self.api.as_ref();
        let instance_arn = self.instance.instance_arn.as_str();
        let mut grants = Vec::new();

        let accounts = collect_pages(move |c| api.list_accounts(c)).await?;
        for account_id in &accounts {
            let account = account_id.as_str();
            let permission_sets = collect_pages(move |c| {
                api.list_permission_sets_provisioned_to_account(instance_arn, account, c)
            })
            .await?;

            for permission_set_arn in permission_sets {
                for assignment in self
                    .assignments(user_id, account, &permission_set_arn)
                    .await?
                {
                    grants.push(
                        Grant::active(
                            PROVIDER,
                            GrantKind::PermissionSetAssignment,
                            assignment.permission_set_arn,
                        )
                        .with_scope(assignment.account_id),
                    );
                }
            }
        }

        match self.memberships(user_id).await {
            Ok(memberships) => {
                for membership in memberships {
                    grants.push(
                        Grant::active(
                            PROVIDER,
                            GrantKind::SsoGroupMembership,
                            membership.membership_id,
                        )
                        .with_scope(membership.group_id),
                    );
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if api
            .describe_user(&self.instance.identity_store_id, user_id)
            .await?
        {
            grants.push(Grant::active(PROVIDER, GrantKind::Identity, user_id));
        }

        Ok(grants)
    }
}

#[async_trait]
impl Revoker for SsoProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn describe(&self, principal: &Principal, grant: &Grant) -> String {
        let user = principal.identifier(PROVIDER).unwrap_or("-");
        match grant.kind {
            GrantKind::PermissionSetAssignment => format!(
                "remove assignment of permission set {} in account {} from {user}",
                grant.resource_id,
                grant.scope.as_deref().unwrap_or("unknown")
            ),
            GrantKind::SsoGroupMembership => format!(
                "remove {user} from SSO group {}",
                grant.scope.as_deref().unwrap_or(&grant.resource_id)
            ),
            GrantKind::Identity => format!(
                "delete SSO user {user} from identity store {}",
                self.instance.identity_store_id
            ),
            other => format!("revoke {other} {} for {user}", grant.resource_id),
        }
    }

    async fn is_present(&self, principal: &Principal, grant: &Grant) -> ApiResult<bool> {
        let user_id = identifier(principal, PROVIDER)?;
        match grant.kind {
            GrantKind::PermissionSetAssignment => {
                let account = grant.require_scope()?;
                Ok(!self
                    .assignments(user_id, account, &grant.resource_id)
                    .await?
                    .is_empty())
            }
            GrantKind::SsoGroupMembership => match self.memberships(user_id).await {
                Ok(current) => Ok(current
                    .iter()
                    .any(|m| m.membership_id == grant.resource_id)),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            },
            GrantKind::Identity => {
                self.api
                    .describe_user(&self.instance.identity_store_id, user_id)
                    .await
            }
            other => Err(unsupported(other)),
        }
    }

    async fn apply(&self, principal: &Principal, grant: &Grant) -> ApiResult<()> {
        let user_id = identifier(principal, PROVIDER)?;
        match grant.kind {
            GrantKind::PermissionSetAssignment => {
                let assignment = Self::assignment_for(grant, user_id)?;
                self.api
                    .delete_account_assignment(&self.instance.instance_arn, &assignment)
                    .await
            }
            GrantKind::SsoGroupMembership => {
                self.api
                    .delete_group_membership(&self.instance.identity_store_id, &grant.resource_id)
                    .await
            }
            GrantKind::Identity => {
                self.api
                    .delete_user(&self.instance.identity_store_id, user_id)
                    .await
            }
            other => Err(unsupported(other)),
        }
    }
}

fn unsupported(kind: GrantKind) -> ApiError {
    ApiError::invalid_response(format!("{kind} is not an SSO grant"))
}
