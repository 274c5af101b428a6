//! Offboarding error types
//!
//! Two layers: [`ApiError`] is what a provider capability call returns, and
//! [`OffboardError`] is the run-level taxonomy the orchestrator classifies
//! into exit statuses.

use thiserror::Error;

use crate::types::Provider;

/// Error returned by a provider capability call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed resource or principal does not exist at the provider.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The provider refused the call (non-2xx, non-idempotent response).
    #[error("request rejected{}: {message}", status_suffix(.status))]
    Rejected {
        status: Option<u16>,
        message: String,
    },

    /// Credentials were missing, invalid or lack permission.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The transport (network, subprocess) failed before a response.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The response could not be interpreted.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl ApiError {
    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a rejected error.
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        ApiError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ApiError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        ApiError::InvalidResponse {
            message: message.into(),
        }
    }

    /// Whether the error means "this does not exist".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Rejected { .. } => "REJECTED",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Transport { .. } => "TRANSPORT",
            ApiError::InvalidResponse { .. } => "INVALID_RESPONSE",
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Result type for capability calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Run-level error taxonomy.
#[derive(Debug, Error)]
pub enum OffboardError {
    /// Missing or inconsistent configuration; no provider call is attempted.
    #[error("invalid configuration: {message}")]
    Validation { message: String },

    /// A required external tool or credential is unusable.
    #[error("pre-flight check failed for {provider}: {message}")]
    Preflight { provider: Provider, message: String },

    /// A provider's scope listing failed; aborts that module only.
    #[error("enumeration failed for {provider}: {source}")]
    Enumeration {
        provider: Provider,
        #[source]
        source: ApiError,
    },

    /// A single grant's revoke call failed; recorded and the loop continues.
    #[error("revoke failed for {grant}: {source}")]
    Revoke {
        grant: String,
        #[source]
        source: ApiError,
    },

    /// The audit ledger could not be written.
    #[error("audit ledger error: {message}")]
    Audit {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl OffboardError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        OffboardError::Validation {
            message: message.into(),
        }
    }

    /// Create a pre-flight error.
    pub fn preflight(provider: Provider, message: impl Into<String>) -> Self {
        OffboardError::Preflight {
            provider,
            message: message.into(),
        }
    }

    /// Create an enumeration error.
    pub fn enumeration(provider: Provider, source: ApiError) -> Self {
        OffboardError::Enumeration { provider, source }
    }

    /// Create an audit error.
    pub fn audit(message: impl Into<String>) -> Self {
        OffboardError::Audit {
            message: message.into(),
            source: None,
        }
    }

    /// Create an audit error with an I/O source.
    pub fn audit_io(message: impl Into<String>, source: std::io::Error) -> Self {
        OffboardError::Audit {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type for run-level operations.
pub type OffboardResult<T> = Result<T, OffboardError>;
