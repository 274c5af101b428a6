//! Provider-specific enumeration and revoke behaviour.

mod common;

use common::*;
use offboard_core::prelude::*;
use offboard_core::providers::{discover_instance, resolve_user_id};

fn principal() -> Principal {
    Principal::new("alice")
        .with_source_control_login("alice")
        .with_iam_user_name("alice")
        .with_sso_user_id("u-alice")
}

fn loaded_iam_user() -> IamUser {
    IamUser {
        access_keys: vec![IamUser::active_key("AKIA1"), IamUser::active_key("AKIA2")],
        signing_certificates: vec!["CERT1".to_string()],
        ssh_public_keys: vec!["APKA1".to_string()],
        service_credentials: vec!["ACCA1".to_string()],
        mfa_devices: vec!["arn:aws:iam::111122223333:mfa/alice".to_string()],
        login_profile: true,
        attached_policies: vec!["arn:aws:iam::aws:policy/ReadOnlyAccess".to_string()],
        inline_policies: vec!["s3-scratch".to_string()],
        groups: vec!["developers".to_string()],
        tags: vec!["team".to_string()],
    }
}

#[tokio::test]
async fn test_iam_lists_in_revoke_order() {
    let iam = Arc::new(FakeIam::new("111122223333").with_user("alice", loaded_iam_user()));
    let provider = IamProvider::new(iam.clone());

    let kinds: Vec<GrantKind> = provider
        .list(&principal())
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.kind)
        .collect();

    assert_eq!(
        kinds,
        vec![
            GrantKind::AccessKey,
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
        ]
    );
}

#[tokio::test]
async fn test_iam_full_deprovision_with_hard_delete() {
    let iam = Arc::new(FakeIam::new("111122223333").with_user("alice", loaded_iam_user()));
    let audit = std::sync::Arc::new(MemoryAuditSink::new());

    let report = orchestrator(&audit, true)
        .with_module(iam_module(&iam))
        .run(&principal(), &ExecutionContext::execute().with_hard_delete(true))
        .await
        .unwrap();

    assert_eq!(report.status, ExitStatus::Success);
    assert!(iam.user("alice").is_none());

    let calls = iam.mutations.calls();
    let position = |call: &str| calls.iter().position(|c| c == call).unwrap();

    // Keys are deactivated before they are deleted.
    assert!(position("deactivate_access_key AKIA1") < position("delete_access_key AKIA1"));
    // Virtual MFA devices are deleted after deactivation.
    let serial = "arn:aws:iam::111122223333:mfa/alice";
    assert!(
        position(&format!("deactivate_mfa_device {serial}"))
            < position(&format!("delete_virtual_mfa_device {serial}"))
    );
    assert_eq!(calls.last().map(String::as_str), Some("delete_user alice"));
}

#[tokio::test]
async fn test_iam_missing_user_is_empty_listing() {
    let iam = Arc::new(FakeIam::new("111122223333"));
    let audit = std::sync::Arc::new(MemoryAuditSink::new());

    let report = orchestrator(&audit, false)
        .with_module(iam_module(&iam))
        .run(&principal(), &ExecutionContext::execute())
        .await
        .unwrap();

    assert_eq!(report.status, ExitStatus::Success);
    assert!(report.modules[0].results.is_empty());
    assert!(records_with(&audit, Outcome::Info)
        .iter()
        .any(|r| r.message.contains("alice not found at cloud_iam")));
}

#[tokio::test]
async fn test_iam_rejected_detach_is_partial_failure() {
    let policy = "arn:aws:iam::aws:policy/ReadOnlyAccess";
    let iam = Arc::new(
        FakeIam::new("111122223333")
            .with_user("alice", loaded_iam_user())
            .rejecting_detach(policy),
    );
    let audit = std::sync::Arc::new(MemoryAuditSink::new());

    let report = orchestrator(&audit, true)
        .with_module(iam_module(&iam))
        .run(&principal(), &ExecutionContext::execute())
        .await
        .unwrap();

    assert_eq!(
        report.modules[0].outcome,
        ModuleOutcome::PartialFailure { failed: 1 }
    );
    assert_eq!(report.status, ExitStatus::CloudIamFailed);
    assert_eq!(report.status.code(), 11);

    let user = iam.user("alice").unwrap();
    assert_eq!(user.attached_policies, vec![policy.to_string()]);
    assert!(user.groups.is_empty());
    assert!(user.tags.is_empty());
    assert!(user.access_keys.is_empty());
}

fn sso_fixture() -> FakeSso {
    FakeSso::new()
        .with_user("u-alice", "alice@acme.test")
        .with_user("u-bob", "bob@acme.test")
        .with_account("111122223333", &["ps-admin", "ps-read"])
        .with_account("444455556666", &["ps-read"])
        .with_assignment("111122223333", "ps-admin", "USER", "u-alice")
        .with_assignment("111122223333", "ps-admin", "GROUP", "g-eng")
        .with_assignment("111122223333", "ps-read", "USER", "u-bob")
        .with_assignment("444455556666", "ps-read", "USER", "u-alice")
        .with_membership("u-alice", "m-1", "g-eng")
        .with_membership("u-bob", "m-2", "g-eng")
}

#[tokio::test]
async fn test_sso_lists_only_principal_assignments() {
    let sso = Arc::new(sso_fixture());
    let provider = SsoProvider::new(sso.clone(), sso.instance.clone());

    let grants = provider.list(&principal()).await.unwrap();
    let assignments: Vec<(Option<&str>, &str)> = grants
        .iter()
        .filter(|g| g.kind == GrantKind::PermissionSetAssignment)
        .map(|g| (g.scope.as_deref(), g.resource_id.as_str()))
        .collect();

    assert_eq!(
        assignments,
        vec![
            (Some("111122223333"), "ps-admin"),
            (Some("444455556666"), "ps-read"),
        ]
    );

    let kinds: Vec<GrantKind> = grants.iter().map(|g| g.kind).collect();
    assert_eq!(
        kinds[2..],
        [GrantKind::SsoGroupMembership, GrantKind::Identity]
    );
}

#[tokio::test]
async fn test_sso_deprovision_leaves_other_principals() {
    let sso = Arc::new(sso_fixture());
    let audit = std::sync::Arc::new(MemoryAuditSink::new());

    let report = orchestrator(&audit, true)
        .with_module(sso_module(&sso))
        .run(&principal(), &ExecutionContext::execute().with_hard_delete(true))
        .await
        .unwrap();

    assert_eq!(report.status, ExitStatus::Success);
    // Group assignment and bob's assignment remain.
    assert_eq!(sso.assignment_count(), 2);
    assert!(!sso.user_exists("u-alice"));
    assert!(sso.user_exists("u-bob"));
    assert!(sso
        .mutations
        .calls()
        .contains(&"delete_group_membership m-1".to_string()));
}

#[tokio::test]
async fn test_sso_instance_discovery_and_email_resolution() {
    let sso = sso_fixture();

    let instance = discover_instance(&sso).await.unwrap();
    assert_eq!(instance.identity_store_id, "d-123");

    let resolved = resolve_user_id(&sso, &instance, "ALICE@acme.test")
        .await
        .unwrap();
    assert_eq!(resolved.as_deref(), Some("u-alice"));

    let unknown = resolve_user_id(&sso, &instance, "carol@acme.test")
        .await
        .unwrap();
    assert!(unknown.is_none());
}

#[tokio::test]
async fn test_source_control_revokes_own_sso_credentials_only() {
    let github = Arc::new(
        FakeSourceControl::new()
            .with_member("alice")
            .with_credential("Alice", 11)
            .with_credential("bob", 12),
    );
    let audit = std::sync::Arc::new(MemoryAuditSink::new());

    let report = orchestrator(&audit, false)
        .with_module(source_control_module(&github))
        .run(&principal(), &ExecutionContext::execute())
        .await
        .unwrap();

    assert_eq!(report.status, ExitStatus::Success);
    let calls = github.mutations.calls();
    assert_eq!(
        calls,
        vec![
            "revoke_sso_credential 11".to_string(),
            "remove_org_member acme alice".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_source_control_without_saml_skips_credentials() {
    let github = Arc::new(FakeSourceControl::new().with_member("alice").without_saml());
    let provider = SourceControlProvider::new(github.clone(), "acme");

    let grants = provider.list(&principal()).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].kind, GrantKind::OrgMembership);
}
