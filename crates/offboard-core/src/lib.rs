//! # Offboard Core
//!
//! Deprovisioning and reconciliation engine for a departing user's access.
//!
//! ## Architecture
//!
//! Each provider is modeled as a pair of capabilities:
//!
//! - [`GrantSource`] - Enumerate the grants a principal holds (pure read)
//! - [`Revoker`] - Idempotently revoke one grant
//!
//! A [`ProviderModule`] composes the pair into one
//! `ENUMERATE -> (REVOKE)* -> DONE` pass, with every revoke routed through
//! the [`DryRunGate`]. The [`Orchestrator`] runs modules in fixed provider
//! order, folds their outcomes into an [`ExitStatus`] and, outside simulate
//! mode, hands over to the [`Verifier`], which re-lists every provider with
//! no shared state. Every action lands in an [`AuditSink`].
//!
//! ## Example
//!
//! ```ignore
//! use offboard_core::prelude::*;
//!
//! let ledger: Arc<dyn AuditSink> = Arc::new(JsonLedger::open("offboard-ledger.json")?);
//! let github = SourceControlProvider::new(api, "acme");
//!
//! let orchestrator = Orchestrator::new(ledger, Arc::new(FixedAnswer(false)))
//!     .with_module(ProviderModule::from_provider(Arc::new(github)));
//!
//! let principal = Principal::new("alice").with_source_control_login("alice");
//! let report = orchestrator.run(&principal, &ExecutionContext::simulate()).await?;
//! std::process::exit(report.status.code());
//! ```
//!
//! ## Crate Organization
//!
//! - [`types`] - Provider, grant kind and outcome enums
//! - [`error`] - Capability and run-level error types
//! - [`grant`] - Principal and grant model
//! - [`page`] - Cursor pagination helper
//! - [`record`] - Audit ledger records
//! - [`audit`] - Audit sinks and the JSON ledger
//! - [`context`] - Execution context and confirmation seam
//! - [`traits`] - Capability traits
//! - [`gate`] - Dry-run gate
//! - [`module`] - Provider module state machine
//! - [`verifier`] - Independent verification pass
//! - [`orchestrator`] - Run orchestration
//! - [`exit`] - Exit taxonomy
//! - [`providers`] - Source control, cloud IAM and cloud SSO instances

pub mod audit;
pub mod context;
pub mod error;
pub mod exit;
pub mod gate;
pub mod grant;
pub mod module;
pub mod orchestrator;
pub mod page;
pub mod providers;
pub mod record;
pub mod traits;
pub mod types;
pub mod verifier;

pub use audit::{AuditSink, JsonLedger, MemoryAuditSink};
pub use context::{Confirm, ExecutionContext, FixedAnswer};
pub use error::{ApiError, ApiResult, OffboardError, OffboardResult};
pub use exit::{ExitStatus, RunOutcome};
pub use gate::{DryRunGate, RevokeResult};
pub use grant::{Grant, Principal};
pub use module::{GrantResult, ModuleOutcome, ModuleReport, ProviderModule};
pub use orchestrator::{Orchestrator, RunReport};
pub use page::{collect_pages, Page};
pub use record::ActionRecord;
pub use traits::{GrantSource, RevokeStatus, Revoker};
pub use types::{GrantKind, GrantStatus, Outcome, Presence, Provider, RunMode};
pub use verifier::{ResidualFinding, VerificationReport, Verifier};

/// Prelude module for convenient imports.
///
/// ```
/// use offboard_core::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Model
    pub use crate::grant::{Grant, Principal};
    pub use crate::types::{GrantKind, GrantStatus, Outcome, Presence, Provider, RunMode};

    // Error handling
    pub use crate::error::{ApiError, ApiResult, OffboardError, OffboardResult};

    // Capabilities
    pub use crate::page::{collect_pages, Page};
    pub use crate::traits::{GrantSource, RevokeStatus, Revoker};

    // Engine
    pub use crate::audit::{AuditSink, JsonLedger, MemoryAuditSink};
    pub use crate::context::{Confirm, ExecutionContext, FixedAnswer};
    pub use crate::exit::ExitStatus;
    pub use crate::gate::DryRunGate;
    pub use crate::module::{ModuleOutcome, ProviderModule};
    pub use crate::orchestrator::{Orchestrator, RunReport};
    pub use crate::verifier::Verifier;

    // Providers
    pub use crate::providers::{
        IamApi, IamProvider, SourceControlApi, SourceControlProvider, SsoApi, SsoInstance,
        SsoProvider,
    };
}

// Re-export async_trait for capability implementors
pub use async_trait::async_trait;
