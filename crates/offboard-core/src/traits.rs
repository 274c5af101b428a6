//! Capability traits
//!
//! Each provider implements two capabilities: [`GrantSource`] enumerates what
//! a principal holds, and [`Revoker`] removes one grant at a time. The
//! verifier depends only on `GrantSource`, so it can be pointed at any
//! enumerator without touching revocation code.

use async_trait::async_trait;

use crate::context::Confirm;
use crate::error::{ApiResult, OffboardResult};
use crate::grant::{Grant, Principal};
use crate::types::{Presence, Provider};

/// Enumerates the grants a principal holds at one provider.
#[async_trait]
pub trait GrantSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Check tools and credentials before anything is listed or revoked.
    async fn preflight(&self) -> OffboardResult<()> {
        Ok(())
    }

    /// Whether the principal exists at the provider at all.
    async fn presence(&self, principal: &Principal) -> ApiResult<Presence>;

    /// Every grant the principal currently holds, all pages included.
    ///
    /// The returned order is the order grants must be revoked in.
    async fn list(&self, principal: &Principal) -> ApiResult<Vec<Grant>>;
}

/// Result of one revoke attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeStatus {
    /// The mutating call was made and succeeded.
    Applied,
    /// The grant was already gone; no mutation was made.
    AlreadyAbsent,
    /// The operator declined a destructive step.
    Declined,
}

/// Removes individual grants at one provider.
#[async_trait]
pub trait Revoker: Send + Sync {
    fn provider(&self) -> Provider;

    /// Human-readable description of the revoke action, e.g.
    /// "remove alice from team core".
    fn describe(&self, principal: &Principal, grant: &Grant) -> String;

    /// Re-check that the grant still exists right before mutating.
    async fn is_present(&self, principal: &Principal, grant: &Grant) -> ApiResult<bool>;

    /// Perform the mutating call(s) for one grant.
    async fn apply(&self, principal: &Principal, grant: &Grant) -> ApiResult<()>;

    /// Idempotent revoke: check, confirm if destructive, then apply.
    ///
    /// Revoking an already-absent grant makes no mutating call.
    async fn revoke(
        &self,
        principal: &Principal,
        grant: &Grant,
        confirm: &dyn Confirm,
    ) -> ApiResult<RevokeStatus> {
        if !self.is_present(principal, grant).await? {
            return Ok(RevokeStatus::AlreadyAbsent);
        }

        if grant.kind.is_destructive() {
            let prompt = format!("{}? This cannot be undone", self.describe(principal, grant));
            if !confirm.confirm(&prompt) {
                return Ok(RevokeStatus::Declined);
            }
        }

        match self.apply(principal, grant).await {
            Ok(()) => Ok(RevokeStatus::Applied),
            // Lost a race with another actor; the end state is what we want.
            Err(e) if e.is_not_found() => Ok(RevokeStatus::AlreadyAbsent),
            Err(e) => Err(e),
        }
    }
}
