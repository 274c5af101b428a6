//! Common test utilities for offboard-core integration tests.
//!
//! In-memory fakes of the three provider capability traits. Every mutating
//! call is appended to a call log so tests can assert exactly which side
//! effects happened.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use offboard_core::prelude::*;
use offboard_core::providers::{
    AccessKey, AccountAssignment, CredentialAuthorization, Repository, SsoGroupMembership, Team,
};
use offboard_core::{async_trait, ModuleReport, RunReport};

pub const PAGE_SIZE: usize = 100;

/// Slice `items` into a page starting at the numeric `cursor`.
pub fn page_of<T: Clone>(items: &[T], cursor: Option<String>, size: usize) -> ApiResult<Page<T>> {
    let start = match cursor {
        Some(c) => c
            .parse::<usize>()
            .map_err(|_| ApiError::invalid_response(format!("bad cursor {c}")))?,
        None => 0,
    };
    let end = (start + size).min(items.len());
    let chunk = items.get(start..end).unwrap_or_default().to_vec();
    if end < items.len() {
        Ok(Page::with_next(chunk, end.to_string()))
    } else {
        Ok(Page::last(chunk))
    }
}

/// Shared call log.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// Source control
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ScState {
    members: HashSet<String>,
    teams: Vec<(String, HashSet<String>)>,
    repos: Vec<(String, HashSet<String>)>,
    credentials: Vec<CredentialAuthorization>,
}

/// Fake source-control organization.
#[derive(Debug, Default)]
pub struct FakeSourceControl {
    state: Mutex<ScState>,
    pub mutations: CallLog,
    /// Removals report success but change nothing.
    pub no_op_removals: bool,
    /// Removal from these teams or repos is rejected.
    pub reject_removals: HashSet<String>,
    pub fail_listing: bool,
    pub bad_token: bool,
    pub saml: bool,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self {
            saml: true,
            ..Self::default()
        }
    }

    pub fn with_member(self, user: &str) -> Self {
        self.state.lock().unwrap().members.insert(user.to_string());
        self
    }

    pub fn with_team(self, slug: &str, members: &[&str]) -> Self {
        self.state.lock().unwrap().teams.push((
            slug.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        ));
        self
    }

    pub fn with_repo(self, name: &str, collaborators: &[&str]) -> Self {
        self.state.lock().unwrap().repos.push((
            name.to_string(),
            collaborators.iter().map(|m| m.to_string()).collect(),
        ));
        self
    }

    pub fn with_credential(self, login: &str, credential_id: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .credentials
            .push(CredentialAuthorization {
                login: login.to_string(),
                credential_id,
                credential_type: "personal access token".to_string(),
            });
        self
    }

    /// Make removals report success without changing anything.
    pub fn with_no_op_removals(mut self) -> Self {
        self.no_op_removals = true;
        self
    }

    pub fn rejecting_removal_from(mut self, target: &str) -> Self {
        self.reject_removals.insert(target.to_string());
        self
    }

    pub fn with_failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn with_bad_token(mut self) -> Self {
        self.bad_token = true;
        self
    }

    pub fn without_saml(mut self) -> Self {
        self.saml = false;
        self
    }

    /// Reinstate a team membership behind the engine's back.
    pub fn add_to_team(&self, slug: &str, user: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some((_, members)) = state.teams.iter_mut().find(|(s, _)| s == slug) {
            members.insert(user.to_string());
        }
    }

    pub fn is_member(&self, user: &str) -> bool {
        self.state.lock().unwrap().members.contains(user)
    }

    fn mutate(&self, call: String, target: &str) -> ApiResult<bool> {
        self.mutations.push(call);
        if self.reject_removals.contains(target) {
            return Err(ApiError::rejected(Some(422), format!("cannot remove from {target}")));
        }
        Ok(!self.no_op_removals)
    }
}

#[async_trait]
impl SourceControlApi for FakeSourceControl {
    async fn authenticated_login(&self) -> ApiResult<String> {
        if self.bad_token {
            return Err(ApiError::Unauthorized {
                message: "Bad credentials".to_string(),
            });
        }
        Ok("offboard-bot".to_string())
    }

    async fn get_org_membership(&self, _org: &str, user: &str) -> ApiResult<bool> {
        Ok(self.is_member(user))
    }

    async fn remove_org_member(&self, org: &str, user: &str) -> ApiResult<()> {
        if self.mutate(format!("remove_org_member {org} {user}"), org)? {
            let mut state = self.state.lock().unwrap();
            if !state.members.remove(user) {
                return Err(ApiError::not_found(format!("{user} in {org}")));
            }
        }
        Ok(())
    }

    async fn list_teams(&self, _org: &str, cursor: Option<String>) -> ApiResult<Page<Team>> {
        if self.fail_listing {
            return Err(ApiError::transport("connection refused"));
        }
        let teams: Vec<Team> = self
            .state
            .lock()
            .unwrap()
            .teams
            .iter()
            .map(|(slug, _)| Team {
                slug: slug.clone(),
                name: slug.clone(),
            })
            .collect();
        page_of(&teams, cursor, PAGE_SIZE)
    }

    async fn get_team_membership(&self, _org: &str, slug: &str, user: &str) -> ApiResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .teams
            .iter()
            .any(|(s, members)| s == slug && members.contains(user)))
    }

    async fn remove_team_member(&self, _org: &str, slug: &str, user: &str) -> ApiResult<()> {
        if self.mutate(format!("remove_team_member {slug} {user}"), slug)? {
            let mut state = self.state.lock().unwrap();
            if let Some((_, members)) = state.teams.iter_mut().find(|(s, _)| s == slug) {
                members.remove(user);
            }
        }
        Ok(())
    }

    async fn list_org_repos(&self, _org: &str, cursor: Option<String>) -> ApiResult<Page<Repository>> {
        let repos: Vec<Repository> = self
            .state
            .lock()
            .unwrap()
            .repos
            .iter()
            .map(|(name, _)| Repository { name: name.clone() })
            .collect();
        page_of(&repos, cursor, PAGE_SIZE)
    }

    async fn get_repo_collaborator(&self, _org: &str, repo: &str, user: &str) -> ApiResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .repos
            .iter()
            .any(|(r, collaborators)| r == repo && collaborators.contains(user)))
    }

    async fn remove_repo_collaborator(&self, _org: &str, repo: &str, user: &str) -> ApiResult<()> {
        if self.mutate(format!("remove_repo_collaborator {repo} {user}"), repo)? {
            let mut state = self.state.lock().unwrap();
            if let Some((_, collaborators)) = state.repos.iter_mut().find(|(r, _)| r == repo) {
                collaborators.remove(user);
            }
        }
        Ok(())
    }

    async fn list_sso_credential_authorizations(
        &self,
        org: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<CredentialAuthorization>> {
        if !self.saml {
            return Err(ApiError::not_found(format!("SAML SSO for {org}")));
        }
        let credentials = self.state.lock().unwrap().credentials.clone();
        page_of(&credentials, cursor, PAGE_SIZE)
    }

    async fn revoke_sso_credential(&self, org: &str, credential_id: u64) -> ApiResult<()> {
        if self.mutate(format!("revoke_sso_credential {credential_id}"), org)? {
            self.state
                .lock()
                .unwrap()
                .credentials
                .retain(|c| c.credential_id != credential_id);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cloud IAM
// ---------------------------------------------------------------------------

/// Everything attached to one fake IAM user.
#[derive(Debug, Clone, Default)]
pub struct IamUser {
    pub access_keys: Vec<AccessKey>,
    pub signing_certificates: Vec<String>,
    pub ssh_public_keys: Vec<String>,
    pub service_credentials: Vec<String>,
    pub mfa_devices: Vec<String>,
    pub login_profile: bool,
    pub attached_policies: Vec<String>,
    pub inline_policies: Vec<String>,
    pub groups: Vec<String>,
    pub tags: Vec<String>,
}

impl IamUser {
    pub fn active_key(id: &str) -> AccessKey {
        AccessKey {
            access_key_id: id.to_string(),
            status: "Active".to_string(),
        }
    }
}

/// Fake IAM account.
#[derive(Debug)]
pub struct FakeIam {
    pub account: String,
    users: Mutex<HashMap<String, IamUser>>,
    pub mutations: CallLog,
    /// Detaching these policy ARNs is rejected.
    pub reject_detach: HashSet<String>,
}

impl FakeIam {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            users: Mutex::new(HashMap::new()),
            mutations: CallLog::default(),
            reject_detach: HashSet::new(),
        }
    }

    pub fn with_user(self, name: &str, user: IamUser) -> Self {
        self.users.lock().unwrap().insert(name.to_string(), user);
        self
    }

    pub fn rejecting_detach(mut self, policy_arn: &str) -> Self {
        self.reject_detach.insert(policy_arn.to_string());
        self
    }

    pub fn user(&self, name: &str) -> Option<IamUser> {
        self.users.lock().unwrap().get(name).cloned()
    }

    fn read<T>(&self, user: &str, f: impl FnOnce(&IamUser) -> T) -> ApiResult<T> {
        let users = self.users.lock().unwrap();
        users
            .get(user)
            .map(f)
            .ok_or_else(|| ApiError::not_found(format!("user {user}")))
    }

    fn write(&self, call: String, user: &str, f: impl FnOnce(&mut IamUser)) -> ApiResult<()> {
        self.mutations.push(call);
        let mut users = self.users.lock().unwrap();
        let entry = users
            .get_mut(user)
            .ok_or_else(|| ApiError::not_found(format!("user {user}")))?;
        f(entry);
        Ok(())
    }
}

#[async_trait]
impl IamApi for FakeIam {
    async fn caller_account(&self) -> ApiResult<String> {
        Ok(self.account.clone())
    }

    async fn get_user(&self, user: &str) -> ApiResult<bool> {
        Ok(self.users.lock().unwrap().contains_key(user))
    }

    async fn list_access_keys(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<AccessKey>> {
        let keys = self.read(user, |u| u.access_keys.clone())?;
        page_of(&keys, cursor, PAGE_SIZE)
    }

    async fn deactivate_access_key(&self, user: &str, key_id: &str) -> ApiResult<()> {
        self.write(format!("deactivate_access_key {key_id}"), user, |u| {
            for key in u.access_keys.iter_mut().filter(|k| k.access_key_id == key_id) {
                key.status = "Inactive".to_string();
            }
        })
    }

    async fn delete_access_key(&self, user: &str, key_id: &str) -> ApiResult<()> {
        self.write(format!("delete_access_key {key_id}"), user, |u| {
            u.access_keys.retain(|k| k.access_key_id != key_id);
        })
    }

    async fn list_signing_certificates(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let certs = self.read(user, |u| u.signing_certificates.clone())?;
        page_of(&certs, cursor, PAGE_SIZE)
    }

    async fn delete_signing_certificate(&self, user: &str, certificate_id: &str) -> ApiResult<()> {
        self.write(format!("delete_signing_certificate {certificate_id}"), user, |u| {
            u.signing_certificates.retain(|c| c != certificate_id);
        })
    }

    async fn list_ssh_public_keys(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let keys = self.read(user, |u| u.ssh_public_keys.clone())?;
        page_of(&keys, cursor, PAGE_SIZE)
    }

    async fn delete_ssh_public_key(&self, user: &str, key_id: &str) -> ApiResult<()> {
        self.write(format!("delete_ssh_public_key {key_id}"), user, |u| {
            u.ssh_public_keys.retain(|k| k != key_id);
        })
    }

    async fn list_service_specific_credentials(&self, user: &str) -> ApiResult<Vec<String>> {
        self.read(user, |u| u.service_credentials.clone())
    }

    async fn delete_service_specific_credential(&self, user: &str, credential_id: &str) -> ApiResult<()> {
        self.write(format!("delete_service_specific_credential {credential_id}"), user, |u| {
            u.service_credentials.retain(|c| c != credential_id);
        })
    }

    async fn list_mfa_devices(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let devices = self.read(user, |u| u.mfa_devices.clone())?;
        page_of(&devices, cursor, PAGE_SIZE)
    }

    async fn deactivate_mfa_device(&self, user: &str, serial_number: &str) -> ApiResult<()> {
        self.write(format!("deactivate_mfa_device {serial_number}"), user, |u| {
            u.mfa_devices.retain(|d| d != serial_number);
        })
    }

    async fn delete_virtual_mfa_device(&self, serial_number: &str) -> ApiResult<()> {
        self.mutations.push(format!("delete_virtual_mfa_device {serial_number}"));
        Ok(())
    }

    async fn get_login_profile(&self, user: &str) -> ApiResult<bool> {
        self.read(user, |u| u.login_profile)
    }

    async fn delete_login_profile(&self, user: &str) -> ApiResult<()> {
        self.write("delete_login_profile".to_string(), user, |u| {
            u.login_profile = false;
        })
    }

    async fn list_attached_policies(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let policies = self.read(user, |u| u.attached_policies.clone())?;
        page_of(&policies, cursor, PAGE_SIZE)
    }

    async fn detach_policy(&self, user: &str, policy_arn: &str) -> ApiResult<()> {
        if self.reject_detach.contains(policy_arn) {
            self.mutations.push(format!("detach_policy {policy_arn}"));
            return Err(ApiError::rejected(None, "AccessDenied"));
        }
        self.write(format!("detach_policy {policy_arn}"), user, |u| {
            u.attached_policies.retain(|p| p != policy_arn);
        })
    }

    async fn list_inline_policies(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let policies = self.read(user, |u| u.inline_policies.clone())?;
        page_of(&policies, cursor, PAGE_SIZE)
    }

    async fn delete_inline_policy(&self, user: &str, policy_name: &str) -> ApiResult<()> {
        self.write(format!("delete_inline_policy {policy_name}"), user, |u| {
            u.inline_policies.retain(|p| p != policy_name);
        })
    }

    async fn list_groups_for_user(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let groups = self.read(user, |u| u.groups.clone())?;
        page_of(&groups, cursor, PAGE_SIZE)
    }

    async fn remove_user_from_group(&self, user: &str, group: &str) -> ApiResult<()> {
        self.write(format!("remove_user_from_group {group}"), user, |u| {
            u.groups.retain(|g| g != group);
        })
    }

    async fn list_user_tags(&self, user: &str, cursor: Option<String>) -> ApiResult<Page<String>> {
        let tags = self.read(user, |u| u.tags.clone())?;
        page_of(&tags, cursor, PAGE_SIZE)
    }

    async fn untag_user(&self, user: &str, tag_key: &str) -> ApiResult<()> {
        self.write(format!("untag_user {tag_key}"), user, |u| {
            u.tags.retain(|t| t != tag_key);
        })
    }

    async fn delete_user(&self, user: &str) -> ApiResult<()> {
        self.mutations.push(format!("delete_user {user}"));
        self.users
            .lock()
            .unwrap()
            .remove(user)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("user {user}")))
    }
}

// ---------------------------------------------------------------------------
// Cloud SSO
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SsoState {
    users: HashMap<String, String>,
    accounts: Vec<String>,
    permission_sets: HashMap<String, Vec<String>>,
    assignments: Vec<AccountAssignment>,
    memberships: Vec<(String, SsoGroupMembership)>,
}

/// Fake SSO instance.
#[derive(Debug)]
pub struct FakeSso {
    pub instance: SsoInstance,
    state: Mutex<SsoState>,
    pub mutations: CallLog,
}

impl FakeSso {
    pub fn new() -> Self {
        Self {
            instance: SsoInstance {
                instance_arn: "arn:aws:sso:::instance/ssoins-1".to_string(),
                identity_store_id: "d-123".to_string(),
            },
            state: Mutex::new(SsoState::default()),
            mutations: CallLog::default(),
        }
    }

    pub fn with_user(self, user_id: &str, email: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user_id.to_string(), email.to_string());
        self
    }

    pub fn with_account(self, account_id: &str, permission_sets: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.accounts.push(account_id.to_string());
            state.permission_sets.insert(
                account_id.to_string(),
                permission_sets.iter().map(|p| p.to_string()).collect(),
            );
        }
        self
    }

    pub fn with_assignment(self, account_id: &str, permission_set: &str, principal_type: &str, principal_id: &str) -> Self {
        self.state.lock().unwrap().assignments.push(AccountAssignment {
            account_id: account_id.to_string(),
            permission_set_arn: permission_set.to_string(),
            principal_type: principal_type.to_string(),
            principal_id: principal_id.to_string(),
        });
        self
    }

    pub fn with_membership(self, user_id: &str, membership_id: &str, group_id: &str) -> Self {
        self.state.lock().unwrap().memberships.push((
            user_id.to_string(),
            SsoGroupMembership {
                membership_id: membership_id.to_string(),
                group_id: group_id.to_string(),
            },
        ));
        self
    }

    pub fn assignment_count(&self) -> usize {
        self.state.lock().unwrap().assignments.len()
    }

    pub fn user_exists(&self, user_id: &str) -> bool {
        self.state.lock().unwrap().users.contains_key(user_id)
    }
}

#[async_trait]
impl SsoApi for FakeSso {
    async fn list_instances(&self) -> ApiResult<Vec<SsoInstance>> {
        Ok(vec![self.instance.clone()])
    }

    async fn resolve_user_id_by_email(&self, _store: &str, email: &str) -> ApiResult<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|(_, e)| e.eq_ignore_ascii_case(email))
            .map(|(id, _)| id.clone()))
    }

    async fn describe_user(&self, _store: &str, user_id: &str) -> ApiResult<bool> {
        Ok(self.user_exists(user_id))
    }

    async fn list_accounts(&self, cursor: Option<String>) -> ApiResult<Page<String>> {
        let accounts = self.state.lock().unwrap().accounts.clone();
        page_of(&accounts, cursor, PAGE_SIZE)
    }

    async fn list_permission_sets_provisioned_to_account(
        &self,
        _instance_arn: &str,
        account_id: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<String>> {
        let sets = self
            .state
            .lock()
            .unwrap()
            .permission_sets
            .get(account_id)
            .cloned()
            .unwrap_or_default();
        page_of(&sets, cursor, PAGE_SIZE)
    }

    async fn list_account_assignments(
        &self,
        _instance_arn: &str,
        account_id: &str,
        permission_set_arn: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<AccountAssignment>> {
        let rows: Vec<AccountAssignment> = self
            .state
            .lock()
            .unwrap()
            .assignments
            .iter()
            .filter(|a| a.account_id == account_id && a.permission_set_arn == permission_set_arn)
            .cloned()
            .collect();
        page_of(&rows, cursor, PAGE_SIZE)
    }

    async fn delete_account_assignment(&self, _instance_arn: &str, assignment: &AccountAssignment) -> ApiResult<()> {
        self.mutations.push(format!(
            "delete_account_assignment {} {}",
            assignment.account_id, assignment.permission_set_arn
        ));
        self.state.lock().unwrap().assignments.retain(|a| a != assignment);
        Ok(())
    }

    async fn list_group_memberships_for_member(
        &self,
        _store: &str,
        user_id: &str,
        cursor: Option<String>,
    ) -> ApiResult<Page<SsoGroupMembership>> {
        let rows: Vec<SsoGroupMembership> = self
            .state
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|(u, _)| u == user_id)
            .map(|(_, m)| m.clone())
            .collect();
        page_of(&rows, cursor, PAGE_SIZE)
    }

    async fn delete_group_membership(&self, _store: &str, membership_id: &str) -> ApiResult<()> {
        self.mutations.push(format!("delete_group_membership {membership_id}"));
        self.state
            .lock()
            .unwrap()
            .memberships
            .retain(|(_, m)| m.membership_id != membership_id);
        Ok(())
    }

    async fn delete_user(&self, _store: &str, user_id: &str) -> ApiResult<()> {
        self.mutations.push(format!("delete_user {user_id}"));
        self.state.lock().unwrap().users.remove(user_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Orchestrator over a memory sink with a fixed confirmation answer.
pub fn orchestrator(audit: &Arc<MemoryAuditSink>, confirm: bool) -> Orchestrator {
    Orchestrator::new(audit.clone(), Arc::new(FixedAnswer(confirm)))
}

/// The source-control module for org "acme".
pub fn source_control_module(fake: &Arc<FakeSourceControl>) -> ProviderModule {
    ProviderModule::from_provider(Arc::new(SourceControlProvider::new(fake.clone(), "acme")))
}

pub fn iam_module(fake: &Arc<FakeIam>) -> ProviderModule {
    ProviderModule::from_provider(Arc::new(IamProvider::new(fake.clone())))
}

pub fn sso_module(fake: &Arc<FakeSso>) -> ProviderModule {
    let instance = fake.instance.clone();
    ProviderModule::from_provider(Arc::new(SsoProvider::new(fake.clone(), instance)))
}

/// Records of one outcome, in ledger order.
pub fn records_with(audit: &MemoryAuditSink, outcome: Outcome) -> Vec<ActionRecord> {
    audit
        .records()
        .into_iter()
        .filter(|r| r.outcome == outcome)
        .collect()
}

/// The (grant, description) pairs a run visited.
pub fn visited(report: &RunReport) -> Vec<(Grant, String)> {
    report
        .modules
        .iter()
        .flat_map(|m: &ModuleReport| m.results.iter())
        .map(|r| (r.grant.clone(), r.description.clone()))
        .collect()
}

pub use offboard_core::ActionRecord;
