//! Cloud IAM user provider.
//!
//! Everything attached to the user is revoked before the user itself, in the
//! order the IAM `DeleteUser` call requires: credentials, MFA, console
//! access, policies, groups, tags, then the (gated) user.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult, OffboardError, OffboardResult};
use crate::grant::{Grant, Principal};
use crate::page::{collect_pages, Page};
use crate::traits::{GrantSource, Revoker};
use crate::types::{GrantKind, Presence, Provider};

use super::{identifier, preflight_failed};

const PROVIDER: Provider = Provider::CloudIam;

/// An access key and its activation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKey {
    pub access_key_id: String,
    pub status: String,
}

/// Raw cloud IAM API surface for one account.
///
/// List calls return identifiers; an unknown user surfaces as
/// [`ApiError::NotFound`].
#[async_trait]
pub trait IamApi: Send + Sync {
    /// Account id of the calling credentials.
    async fn caller_account(&self) -> ApiResult<String>;

    /// Whether the user exists.
    async fn get_user(&self, user: &str) -> ApiResult<bool>;

    async fn list_access_keys(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<AccessKey>>;
    async fn deactivate_access_key(&self, user: &str, key_id: &str) -> ApiResult<()>;
    async fn delete_access_key(&self, user: &str, key_id: &str) -> ApiResult<()>;

    async fn list_signing_certificates(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<String>>;
    async fn delete_signing_certificate(&self, user: &str, certificate_id: &str) -> ApiResult<()>;

    async fn list_ssh_public_keys(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<String>>;
    async fn delete_ssh_public_key(&self, user: &str, key_id: &str) -> ApiResult<()>;

    async fn list_service_specific_credentials(&self, user: &str) -> ApiResult<Vec<String>>;
    async fn delete_service_specific_credential(&self, user: &str, credential_id: &str)
        -> ApiResult<()>;

    /// Serial numbers (ARNs for virtual devices) of assigned MFA devices.
    async fn list_mfa_devices(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<String>>;
    async fn deactivate_mfa_device(&self, user: &str, serial_number: &str) -> ApiResult<()>;
    async fn delete_virtual_mfa_device(&self, serial_number: &str) -> ApiResult<()>;

    /// Whether the user has console password access.
    async fn get_login_profile(&self, user: &str) -> ApiResult<bool>;
    async fn delete_login_profile(&self, user: &str) -> ApiResult<()>;

    /// ARNs of managed policies attached directly to the user.
    async fn list_attached_policies(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<String>>;
    async fn detach_policy(&self, user: &str, policy_arn: &str) -> ApiResult<()>;

    async fn list_inline_policies(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<String>>;
    async fn delete_inline_policy(&self, user: &str, policy_name: &str) -> ApiResult<()>;

    async fn list_groups_for_user(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<String>>;
    async fn remove_user_from_group(&self, user: &str, group: &str) -> ApiResult<()>;

    /// Tag keys on the user.
    async fn list_user_tags(&self, user: &str, cursor: Option<String>)
        -> ApiResult<Page<String>>;
    async fn untag_user(&self, user: &str, tag_key: &str) -> ApiResult<()>;

    async fn delete_user(&self, user: &str) -> ApiResult<()>;
}

/// Cloud IAM provider, optionally pinned to an expected account.
pub struct IamProvider {
    api: Arc<dyn IamApi>,
    expected_account: Option<String>,
}

impl IamProvider {
    pub fn new(api: Arc<dyn IamApi>) -> Self {
        Self {
            api,
            expected_account: None,
        }
    }

    /// Fail pre-flight unless the credentials belong to `account_id`.
    #[must_use]
    pub fn with_expected_account(mut self, account_id: impl Into<String>) -> Self {
        self.expected_account = Some(account_id.into());
        self
    }

    /// Current grants of one kind, in listing order.
    async fn list_kind(&self, user: &str, kind: GrantKind) -> ApiResult<Vec<Grant>> {
        let api = self.api.as_ref();
        let ids: Vec<String> = match kind {
            GrantKind::AccessKey => collect_pages(move |c| api.list_access_keys(user, c))
                .await?
                .into_iter()
                .map(|k| k.access_key_id)
                .collect(),
            GrantKind::SigningCertificate => {
                collect_pages(move |c| api.list_signing_certificates(user, c)).await?
            }
            GrantKind::SshPublicKey => {
                collect_pages(move |c| api.list_ssh_public_keys(user, c)).await?
            }
            GrantKind::ServiceSpecificCredential => {
                api.list_service_specific_credentials(user).await?
            }
            GrantKind::MfaDevice => collect_pages(move |c| api.list_mfa_devices(user, c)).await?,
            GrantKind::LoginProfile => {
                if api.get_login_profile(user).await? {
                    vec![user.to_string()]
                } else {
                    Vec::new()
                }
            }
            GrantKind::AttachedPolicy => {
                collect_pages(move |c| api.list_attached_policies(user, c)).await?
            }
            GrantKind::InlinePolicy => {
                collect_pages(move |c| api.list_inline_policies(user, c)).await?
            }
            GrantKind::GroupMembership => {
                collect_pages(move |c| api.list_groups_for_user(user, c)).await?
            }
            GrantKind::UserTag => collect_pages(move |c| api.list_user_tags(user, c)).await?,
            GrantKind::Identity => {
                if api.get_user(user).await? {
                    vec![user.to_string()]
                } else {
                    Vec::new()
                }
            }
            other => return Err(unsupported(other)),
        };

        Ok(ids
            .into_iter()
            .map(|id| Grant::active(PROVIDER, kind, id))
            .collect())
    }
}

/// Revoke order for IAM grant kinds.
pub const REVOKE_ORDER: [GrantKind; 11] = [
    GrantKind::AccessKey,
    GrantKind::SigningCertificate,
    GrantKind::SshPublicKey,
    GrantKind::ServiceSpecificCredential,
    GrantKind::MfaDevice,
    GrantKind::LoginProfile,
    GrantKind::AttachedPolicy,
    GrantKind::InlinePolicy,
    GrantKind::GroupMembership,
    GrantKind::UserTag,
    GrantKind::Identity,
];

#[async_trait]
impl GrantSource for IamProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn preflight(&self) -> OffboardResult<()> {
        let account = self
            .api
            .caller_account()
            .await
            .map_err(|e| preflight_failed(PROVIDER, "caller identity check failed", &e))?;

        match &self.expected_account {
            Some(expected) if *expected != account => Err(OffboardError::preflight(
                PROVIDER,
                format!("credentials belong to account {account}, expected {expected}"),
            )),
            _ => Ok(()),
        }
    }

    async fn presence(&self, principal: &Principal) -> ApiResult<Presence> {
        let user = identifier(principal, PROVIDER)?;
        if self.api.get_user(user).await? {
            Ok(Presence::Present)
        } else {
            Ok(Presence::Absent)
        }
    }

    async fn list(&self, principal: &Principal) -> ApiResult<Vec<Grant>> {
        let user = identifier(principal, PROVIDER)?;

        if !self.api.get_user(user).await? {
            debug!(user, "IAM user does not exist, nothing to list");
            return Ok(Vec::new());
        }

        let mut grants = Vec::new();
        for kind in REVOKE_ORDER {
            match self.list_kind(user, kind).await {
                Ok(found) => grants.extend(found),
                // Deleted between the existence check and this listing.
                Err(e) if e.is_not_found() => return Ok(Vec::new()),
                Err(e) => return Err(e),
            }
        }
        Ok(grants)
    }
}

#[async_trait]
impl Revoker for IamProvider {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    fn describe(&self, principal: &Principal, grant: &Grant) -> String {
        let user = principal.identifier(PROVIDER).unwrap_or("-");
        let id = &grant.resource_id;
        match grant.kind {
            GrantKind::AccessKey => format!("deactivate and delete access key {id} of {user}"),
            GrantKind::SigningCertificate => format!("delete signing certificate {id} of {user}"),
            GrantKind::SshPublicKey => format!("delete SSH public key {id} of {user}"),
            GrantKind::ServiceSpecificCredential => {
                format!("delete service-specific credential {id} of {user}")
            }
            GrantKind::MfaDevice => format!("deactivate MFA device {id} of {user}"),
            GrantKind::LoginProfile => format!("delete console login profile of {user}"),
            GrantKind::AttachedPolicy => format!("detach policy {id} from {user}"),
            GrantKind::InlinePolicy => format!("delete inline policy {id} of {user}"),
            GrantKind::GroupMembership => format!("remove {user} from group {id}"),
            GrantKind::UserTag => format!("remove tag {id} from {user}"),
            GrantKind::Identity => format!("delete IAM user {user}"),
            other => format!("revoke {other} {id} for {user}"),
        }
    }

    async fn is_present(&self, principal: &Principal, grant: &Grant) -> ApiResult<bool> {
        let user = identifier(principal, PROVIDER)?;
        match self.list_kind(user, grant.kind).await {
            Ok(current) => Ok(current.iter().any(|g| g.resource_id == grant.resource_id)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, principal: &Principal, grant: &Grant) -> ApiResult<()> {
        let user = identifier(principal, PROVIDER)?;
        let id = grant.resource_id.as_str();
        let api = self.api.as_ref();
        match grant.kind {
            GrantKind::AccessKey => {
                api.deactivate_access_key(user, id).await?;
                api.delete_access_key(user, id).await
            }
            GrantKind::SigningCertificate => api.delete_signing_certificate(user, id).await,
            GrantKind::SshPublicKey => api.delete_ssh_public_key(user, id).await,
            GrantKind::ServiceSpecificCredential => {
                api.delete_service_specific_credential(user, id).await
            }
            GrantKind::MfaDevice => {
                api.deactivate_mfa_device(user, id).await?;
                if is_virtual_mfa(id) {
                    api.delete_virtual_mfa_device(id).await?;
                }
                Ok(())
            }
            GrantKind::LoginProfile => api.delete_login_profile(user).await,
            GrantKind::AttachedPolicy => api.detach_policy(user, id).await,
            GrantKind::InlinePolicy => api.delete_inline_policy(user, id).await,
            GrantKind::GroupMembership => api.remove_user_from_group(user, id).await,
            GrantKind::UserTag => api.untag_user(user, id).await,
            GrantKind::Identity => api.delete_user(user).await,
            other => Err(unsupported(other)),
        }
    }
}

fn is_virtual_mfa(serial_number: &str) -> bool {
    serial_number.starts_with("arn:") && serial_number.contains(":mfa/")
}

fn unsupported(kind: GrantKind) -> ApiError {
    ApiError::invalid_response(format!("{kind} is not an IAM grant"))
}
