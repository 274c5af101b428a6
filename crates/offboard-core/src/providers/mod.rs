//! Provider instances
//!
//! Each provider pairs a capability trait (the raw API surface an adapter
//! crate implements) with a struct that turns it into a [`GrantSource`] and
//! [`Revoker`].
//!
//! [`GrantSource`]: crate::traits::GrantSource
//! [`Revoker`]: crate::traits::Revoker

pub mod iam;
pub mod source_control;
pub mod sso;

pub use iam::{AccessKey, IamApi, IamProvider};
pub use source_control::{
    CredentialAuthorization, Repository, SourceControlApi, SourceControlProvider, Team,
};
pub use sso::{
    discover_instance, resolve_user_id, AccountAssignment, SsoApi, SsoGroupMembership,
    SsoInstance, SsoProvider,
};

use crate::error::{ApiError, ApiResult, OffboardError};
use crate::grant::Principal;
use crate::types::Provider;

/// The principal's identifier at `provider`, or an error if it has none.
pub(crate) fn identifier(principal: &Principal, provider: Provider) -> ApiResult<&str> {
    principal.identifier(provider).ok_or_else(|| {
        ApiError::invalid_response(format!("{principal} has no identifier at {provider}"))
    })
}

pub(crate) fn preflight_failed(provider: Provider, check: &str, error: &ApiError) -> OffboardError {
    OffboardError::preflight(provider, format!("{check}: {error}"))
}
