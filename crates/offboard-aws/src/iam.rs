//! [`IamApi`] over `aws iam` and `aws sts`.

use async_trait::async_trait;
use offboard_core::providers::{AccessKey, IamApi};
use offboard_core::{ApiResult, Page};
use serde::Deserialize;

use crate::error::AwsResult;
use crate::runner::{paged, AwsCli};

const IAM: &str = "iam";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccessKeyMetadata {
    access_key_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccessKeysOutput {
    #[serde(default)]
    access_key_metadata: Vec<AccessKeyMetadata>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Certificate {
    certificate_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CertificatesOutput {
    #[serde(default)]
    certificates: Vec<Certificate>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SshKey {
    #[serde(rename = "SSHPublicKeyId")]
    ssh_public_key_id: String,
}

#[derive(Debug, Deserialize)]
struct SshKeysOutput {
    #[serde(rename = "SSHPublicKeys", default)]
    ssh_public_keys: Vec<SshKey>,
    #[serde(rename = "NextToken")]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceCredential {
    service_specific_credential_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceCredentialsOutput {
    #[serde(default)]
    service_specific_credentials: Vec<ServiceCredential>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MfaDevice {
    serial_number: String,
}

#[derive(Debug, Deserialize)]
struct MfaDevicesOutput {
    #[serde(rename = "MFADevices", default)]
    mfa_devices: Vec<MfaDevice>,
    #[serde(rename = "NextToken")]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPolicy {
    policy_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachedPoliciesOutput {
    #[serde(default)]
    attached_policies: Vec<AttachedPolicy>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyNamesOutput {
    #[serde(default)]
    policy_names: Vec<String>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Group {
    group_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GroupsOutput {
    #[serde(default)]
    groups: Vec<Group>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TagsOutput {
    #[serde(default)]
    tags: Vec<Tag>,
    next_token: Option<String>,
}

/// Cloud IAM capability backed by the aws tool.
#[derive(Debug, Clone)]
pub struct AwsIam {
    cli: AwsCli,
}

impl AwsIam {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }

    async fn exists(&self, operation: &str, user: &str) -> AwsResult<bool> {
        match self
            .cli
            .exec(IAM, operation, &["--user-name", user])
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl IamApi for AwsIam {
    async fn caller_account(&self) -> ApiResult<String> {
        let identity: CallerIdentity = self.cli.call("sts", "get-caller-identity", &[]).await?;
        Ok(identity.account)
    }

    async fn get_user(&self, user: &str) -> ApiResult<bool> {
        Ok(self.exists("get-user", user).await?)
    }

    async fn list_access_keys(
        &self,
        user: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<AccessKey>> {
        let out: AccessKeysOutput = self
            .cli
            .call(IAM, "list-access-keys", &paged(vec!["--user-name", user], &cursor))
            .await?;
        Ok(Page {
            items: out
                .access_key_metadata
                .into_iter()
                .map(|k| AccessKey {
                    access_key_id: k.access_key_id,
                    status: k.status,
                })
                .collect(),
            next: out.next_token,
        })
    }

    async fn deactivate_access_key(&self, user: &str, key_id: &str) -> ApiResult<()> {
        let args = [
            "--user-name",
            user,
            "--access-key-id",
            key_id,
            "--status",
            "Inactive",
        ];
        Ok(self.cli.exec(IAM, "update-access-key", &args).await?)
    }

    async fn delete_access_key(&self, user: &str, key_id: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--access-key-id", key_id];
        Ok(self.cli.exec(IAM, "delete-access-key", &args).await?)
    }

    async fn list_signing_certificates(
        &self,
        user: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>> {
        let out: CertificatesOutput = self
            .cli
            .call(
                IAM,
                "list-signing-certificates",
                &paged(vec!["--user-name", user], &cursor),
            )
            .await?;
        Ok(Page {
            items: out.certificates.into_iter().map(|c| c.certificate_id).collect(),
            next: out.next_token,
        })
    }

    async fn delete_signing_certificate(&self, user: &str, certificate_id: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--certificate-id", certificate_id];
        Ok(self.cli.exec(IAM, "delete-signing-certificate", &args).await?)
    }

    async fn list_ssh_public_keys(
        &self,
        user: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>> {
        let out: SshKeysOutput = self
            .cli
            .call(
                IAM,
                "list-ssh-public-keys",
                &paged(vec!["--user-name", user], &cursor),
            )
            .await?;
        Ok(Page {
            items: out
                .ssh_public_keys
                .into_iter()
                .map(|k| k.ssh_public_key_id)
                .collect(),
            next: out.next_token,
        })
    }

    async fn delete_ssh_public_key(&self, user: &str, key_id: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--ssh-public-key-id", key_id];
        Ok(self.cli.exec(IAM, "delete-ssh-public-key", &args).await?)
    }

    async fn list_service_specific_credentials(&self, user: &str) -> ApiResult<Vec<String>> {
        let out: ServiceCredentialsOutput = self
            .cli
            .call(IAM, "list-service-specific-credentials", &["--user-name", user])
            .await?;
        Ok(out
            .service_specific_credentials
            .into_iter()
            .map(|c| c.service_specific_credential_id)
            .collect())
    }

    async fn delete_service_specific_credential(
        &self,
        user: &str,
        credential_id: &str,
    ) -> ApiResult<()> {
        let args = [
            "--user-name",
            user,
            "--service-specific-credential-id",
            credential_id,
        ];
        Ok(self
            .cli
            .exec(IAM, "delete-service-specific-credential", &args)
            .await?)
    }

    async fn list_mfa_devices(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let out: MfaDevicesOutput = self
            .cli
            .call(IAM, "list-mfa-devices", &paged(vec!["--user-name", user], &cursor))
            .await?;
        Ok(Page {
            items: out.mfa_devices.into_iter().map(|d| d.serial_number).collect(),
            next: out.next_token,
        })
    }

    async fn deactivate_mfa_device(&self, user: &str, serial_number: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--serial-number", serial_number];
        Ok(self.cli.exec(IAM, "deactivate-mfa-device", &args).await?)
    }

    async fn delete_virtual_mfa_device(&self, serial_number: &str) -> ApiResult<()> {
        let args = ["--serial-number", serial_number];
        Ok(self.cli.exec(IAM, "delete-virtual-mfa-device", &args).await?)
    }

    async fn get_login_profile(&self, user: &str) -> ApiResult<bool> {
        Ok(self.exists("get-login-profile", user).await?)
    }

    async fn delete_login_profile(&self, user: &str) -> ApiResult<()> {
        Ok(self
            .cli
            .exec(IAM, "delete-login-profile", &["--user-name", user])
            .await?)
    }

    async fn list_attached_policies(
        &self,
        user: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>> {
        let out: AttachedPoliciesOutput = self
            .cli
            .call(
                IAM,
                "list-attached-user-policies",
                &paged(vec!["--user-name", user], &cursor),
            )
            .await?;
        Ok(Page {
            items: out.attached_policies.into_iter().map(|p| p.policy_arn).collect(),
            next: out.next_token,
        })
    }

    async fn detach_policy(&self, user: &str, policy_arn: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--policy-arn", policy_arn];
        Ok(self.cli.exec(IAM, "detach-user-policy", &args).await?)
    }

    async fn list_inline_policies(
        &self,
        user: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>> {
        let out: PolicyNamesOutput = self
            .cli
            .call(IAM, "list-user-policies", &paged(vec!["--user-name", user], &cursor))
            .await?;
        Ok(Page {
            items: out.policy_names,
            next: out.next_token,
        })
    }

    async fn delete_inline_policy(&self, user: &str, policy_name: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--policy-name", policy_name];
        Ok(self.cli.exec(IAM, "delete-user-policy", &args).await?)
    }

    async fn list_groups_for_user(
        &self,
        user: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>> {
        let out: GroupsOutput = self
            .cli
            .call(
                IAM,
                "list-groups-for-user",
                &paged(vec!["--user-name", user], &cursor),
            )
            .await?;
        Ok(Page {
            items: out.groups.into_iter().map(|g| g.group_name).collect(),
            next: out.next_token,
        })
    }

    async fn remove_user_from_group(&self, user: &str, group: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--group-name", group];
        Ok(self.cli.exec(IAM, "remove-user-from-group", &args).await?)
    }

    async fn list_user_tags(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let out: TagsOutput = self
            .cli
            .call(IAM, "list-user-tags", &paged(vec!["--user-name", user], &cursor))
            .await?;
        Ok(Page {
            items: out.tags.into_iter().map(|t| t.key).collect(),
            next: out.next_token,
        })
    }

    async fn untag_user(&self, user: &str, tag_key: &str) -> ApiResult<()> {
        let args = ["--user-name", user, "--tag-keys", tag_key];
        Ok(self.cli.exec(IAM, "untag-user", &args).await?)
    }

    async fn delete_user(&self, user: &str) -> ApiResult<()> {
        Ok(self.cli.exec(IAM, "delete-user", &["--user-name", user]).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_keys_output() {
        let out: AccessKeysOutput = serde_json::from_str(
            r#"{
                "AccessKeyMetadata": [
                    {"UserName": "alice", "AccessKeyId": "AKIA1", "Status": "Active",
                     "CreateDate": "2024-01-01T00:00:00+00:00"}
                ],
                "NextToken": "eyJNYXJrZXIiOiBudWxsfQ=="
            }"#,
        )
        .unwrap();
        assert_eq!(out.access_key_metadata[0].access_key_id, "AKIA1");
        assert_eq!(out.next_token.as_deref(), Some("eyJNYXJrZXIiOiBudWxsfQ=="));
    }

    #[test]
    fn test_irregular_field_names() {
        let ssh: SshKeysOutput = serde_json::from_str(
            r#"{"SSHPublicKeys": [{"UserName": "alice", "SSHPublicKeyId": "APKA1", "Status": "Active"}]}"#,
        )
        .unwrap();
        assert_eq!(ssh.ssh_public_keys[0].ssh_public_key_id, "APKA1");
        assert!(ssh.next_token.is_none());

        let mfa: MfaDevicesOutput = serde_json::from_str(
            r#"{"MFADevices": [{"UserName": "alice", "SerialNumber": "arn:aws:iam::111122223333:mfa/alice"}]}"#,
        )
        .unwrap();
        assert_eq!(
            mfa.mfa_devices[0].serial_number,
            "arn:aws:iam::111122223333:mfa/alice"
        );
    }

    #[test]
    fn test_empty_listing_defaults() {
        let out: GroupsOutput = serde_json::from_str("{}").unwrap();
        assert!(out.groups.is_empty());
    }
}
