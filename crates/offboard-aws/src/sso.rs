//! [`SsoApi`] over `aws sso-admin`, `aws identitystore` and
//! `aws organizations`.

use std::time::Duration;

use async_trait::async_trait;
use offboard_core::providers::{AccountAssignment, SsoApi, SsoGroupMembership, SsoInstance};
use offboard_core::{ApiError, ApiResult, Page};
use serde::Deserialize;
use tracing::debug;

use crate::error::AwsResult;
use crate::runner::{paged, AwsCli};

const SSO_ADMIN: &str = "sso-admin";
const IDENTITY_STORE: &str = "identitystore";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstancesOutput {
    #[serde(default)]
    instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
    instance_arn: String,
    identity_store_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserIdOutput {
    user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountsOutput {
    #[serde(default)]
    accounts: Vec<Account>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Account {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PermissionSetsOutput {
    #[serde(default)]
    permission_sets: Vec<String>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssignmentsOutput {
    #[serde(default)]
    account_assignments: Vec<Assignment>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Assignment {
    account_id: String,
    permission_set_arn: String,
    principal_type: String,
    principal_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MembershipsOutput {
    #[serde(default)]
    group_memberships: Vec<Membership>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Membership {
    membership_id: String,
    group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeletionOutput {
    account_assignment_deletion_status: DeletionStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeletionStatus {
    status: String,
    request_id: Option<String>,
    failure_reason: Option<String>,
}

/// Cloud SSO capability backed by the aws tool.
#[derive(Debug, Clone)]
pub struct AwsSso {
    cli: AwsCli,
    poll_interval: Duration,
    max_polls: u32,
}

impl AwsSso {
    pub fn new(cli: AwsCli) -> Self {
        Self {
            cli,
            poll_interval: Duration::from_secs(2),
            max_polls: 30,
        }
    }

    /// Override how assignment deletions are awaited.
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Assignment deletion is asynchronous; wait for it to settle.
    async fn await_deletion(&self, instance_arn: &str, mut status: DeletionStatus) -> ApiResult<()> {
        let mut polls = 0;
        loop {
            match status.status.as_str() {
                "SUCCEEDED" => return Ok(()),
                "FAILED" => {
                    return Err(ApiError::rejected(
                        None,
                        status
                            .failure_reason
                            .unwrap_or_else(|| "assignment deletion failed".to_string()),
                    ))
                }
                _ => {}
            }

            let Some(request_id) = status.request_id.clone() else {
                return Err(ApiError::invalid_response(
                    "assignment deletion in progress without a request id",
                ));
            };
            if polls >= self.max_polls {
                return Err(ApiError::transport(format!(
                    "assignment deletion {request_id} still {} after {polls} checks",
                    status.status
                )));
            }
            polls += 1;
            debug!(request_id = %request_id, polls, "waiting for assignment deletion");
            tokio::time::sleep(self.poll_interval).await;

            let out: DeletionOutput = self
                .cli
                .call(
                    SSO_ADMIN,
                    "describe-account-assignment-deletion-status",
                    &[
                        "--instance-arn",
                        instance_arn,
                        "--account-assignment-deletion-request-id",
                        &request_id,
                    ],
                )
                .await?;
            status = out.account_assignment_deletion_status;
        }
    }

    async fn user_id_for_email(&self, identity_store_id: &str, email: &str) -> AwsResult<String> {
        let identifier = serde_json::json!({
            "UniqueAttribute": {
                "AttributePath": "emails.value",
                "AttributeValue": email,
            }
        })
        .to_string();
        let out: UserIdOutput = self
            .cli
            .call(
                IDENTITY_STORE,
                "get-user-id",
                &[
                    "--identity-store-id",
                    identity_store_id,
                    "--alternate-identifier",
                    &identifier,
                ],
            )
            .await?;
        Ok(out.user_id)
    }
}

#[async_trait]
impl SsoApi for AwsSso {
    async fn list_instances(&self) -> ApiResult<Vec<SsoInstance>> {
        let out: InstancesOutput = self.cli.call(SSO_ADMIN, "list-instances", &[]).await?;
        Ok(out
            .instances
            .into_iter()
            .map(|i| SsoInstance {
                instance_arn: i.instance_arn,
                identity_store_id: i.identity_store_id,
            })
            .collect())
    }

    async fn resolve_user_id_by_email(
        &self,
        identity_store_id: &str,
        email: &str,
    ) -> ApiResult<Option<String>> {
        match self.user_id_for_email(identity_store_id, email).await {
            Ok(id) => Ok(Some(id)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn describe_user(&self, identity_store_id: &str, user_id: &str) -> ApiResult<bool> {
        let args = ["--identity-store-id", identity_store_id, "--user-id", user_id];
        match self.cli.exec(IDENTITY_STORE, "describe-user", &args).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_accounts(&self, cursor: Option<String>) -> ApiResult<Page<String>> {
        let out: AccountsOutput = self
            .cli
            .call("organizations", "list-accounts", &paged(vec![], &cursor))
            .await?;
        Ok(Page {
            items: out.accounts.into_iter().map(|a| a.id).collect(),
            next: out.next_token,
        })
    }

    async fn list_permission_sets_provisioned_to_account(
        &self,
        instance_arn: &str,
        account_id: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>> {
        let args = paged(
            vec!["--instance-arn", instance_arn, "--account-id", account_id],
            &cursor,
        );
        let out: PermissionSetsOutput = self
            .cli
            .call(SSO_ADMIN, "list-permission-sets-provisioned-to-account", &args)
            .await?;
        Ok(Page {
            items: out.permission_sets,
            next: out.next_token,
        })
    }

    async fn list_account_assignments(
        &self,
        instance_arn: &str,
        account_id: &str,
        permission_set_arn: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<AccountAssignment>> {
        let args = paged(
            vec![
                "--instance-arn",
                instance_arn,
                "--account-id",
                account_id,
                "--permission-set-arn",
                permission_set_arn,
            ],
            &cursor,
        );
        let out: AssignmentsOutput = self
            .cli
            .call(SSO_ADMIN, "list-account-assignments", &args)
            .await?;
        Ok(Page {
            items: out
                .account_assignments
                .into_iter()
                .map(|a| AccountAssignment {
                    account_id: a.account_id,
                    permission_set_arn: a.permission_set_arn,
                    principal_type: a.principal_type,
                    principal_id: a.principal_id,
                })
                .collect(),
            next: out.next_token,
        })
    }

    async fn delete_account_assignment(
        &self,
        instance_arn: &str,
        assignment: &AccountAssignment,
    ) -> ApiResult<()> {
        let args = [
            "--instance-arn",
            instance_arn,
            "--target-id",
            assignment.account_id.as_str(),
            "--target-type",
            "AWS_ACCOUNT",
            "--permission-set-arn",
            assignment.permission_set_arn.as_str(),
            "--principal-type",
            assignment.principal_type.as_str(),
            "--principal-id",
            assignment.principal_id.as_str(),
        ];
        let out: DeletionOutput = self
            .cli
            .call(SSO_ADMIN, "delete-account-assignment", &args)
            .await?;
        self.await_deletion(instance_arn, out.account_assignment_deletion_status)
            .await
    }

    async fn list_group_memberships_for_member(
        &self,
        identity_store_id: &str,
        user_id: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<SsoGroupMembership>> {
        let member = format!("UserId={user_id}");
        let args = paged(
            vec!["--identity-store-id", identity_store_id, "--member-id", &member],
            &cursor,
        );
        let out: MembershipsOutput = self
            .cli
            .call(IDENTITY_STORE, "list-group-memberships-for-member", &args)
            .await?;
        Ok(Page {
            items: out
                .group_memberships
                .into_iter()
                .map(|m| SsoGroupMembership {
                    membership_id: m.membership_id,
                    group_id: m.group_id,
                })
                .collect(),
            next: out.next_token,
        })
    }

    async fn delete_group_membership(
        &self,
        identity_store_id: &str,
        membership_id: &str,
    ) -> ApiResult<()> {
        let args = [
            "--identity-store-id",
            identity_store_id,
            "--membership-id",
            membership_id,
        ];
        Ok(self
            .cli
            .exec(IDENTITY_STORE, "delete-group-membership", &args)
            .await?)
    }

    async fn delete_user(&self, identity_store_id: &str, user_id: &str) -> ApiResult<()> {
        let args = ["--identity-store-id", identity_store_id, "--user-id", user_id];
        Ok(self.cli.exec(IDENTITY_STORE, "delete-user", &args).await?)
    }
}
