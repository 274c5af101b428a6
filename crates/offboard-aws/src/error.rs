//! Error types for the aws CLI adapter.

use offboard_core::ApiError;
use thiserror::Error;

/// Result type alias using `AwsCliError`.
pub type AwsResult<T> = Result<T, AwsCliError>;

/// Error codes that mean the addressed entity does not exist.
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchEntity",
    "NoSuchEntityException",
    "ResourceNotFoundException",
    "AccountNotFoundException",
];

/// Error codes that mean the caller's credentials are unusable.
const UNAUTHORIZED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
];

/// Errors from running the aws tool.
#[derive(Debug, Error)]
pub enum AwsCliError {
    /// The tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool did not finish in time.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// The service answered with an error code.
    #[error("{code} on {operation}: {message}")]
    Service {
        code: String,
        operation: String,
        message: String,
    },

    /// The tool failed without a recognizable service error.
    #[error("{operation} exited with {status:?}: {stderr}")]
    Failed {
        operation: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Output was not the JSON we expected.
    #[error("unexpected output from {operation}: {source}")]
    Json {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AwsCliError {
    /// Service error code, if the service produced one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsCliError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the error means the entity does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(|c| NOT_FOUND_CODES.contains(&c))
    }

    fn is_unauthorized(&self) -> bool {
        match self {
            AwsCliError::Service { code, .. } => UNAUTHORIZED_CODES.contains(&code.as_str()),
            AwsCliError::Failed { stderr, .. } => {
                stderr.contains("Unable to locate credentials")
                    || stderr.contains("Token has expired")
            }
            _ => false,
        }
    }
}

/// Parse `An error occurred (Code) when calling the Op operation: message`
/// from the tool's stderr.
pub fn parse_service_error(stderr: &str) -> Option<(String, String)> {
    let line = stderr
        .lines()
        .find(|l| l.contains("An error occurred ("))?;
    let start = line.find("An error occurred (")? + "An error occurred (".len();
    let rest = &line[start..];
    let end = rest.find(')')?;
    let code = rest[..end].trim().to_string();
    let message = rest[end..]
        .split_once(": ")
        .map(|(_, m)| m.trim().to_string())
        .unwrap_or_default();
    Some((code, message))
}

impl From<AwsCliError> for ApiError {
    fn from(err: AwsCliError) -> Self {
        if err.is_not_found() {
            return ApiError::not_found(err.to_string());
        }
        if err.is_unauthorized() {
            return ApiError::Unauthorized {
                message: err.to_string(),
            };
        }
        match err {
            AwsCliError::Service { .. } => ApiError::rejected(None, err.to_string()),
            AwsCliError::Json { .. } => ApiError::invalid_response(err.to_string()),
            AwsCliError::Spawn { .. } => ApiError::transport_with_source("aws tool unavailable", err),
            AwsCliError::Timeout { .. } | AwsCliError::Failed { .. } => {
                ApiError::transport(err.to_string())
            }
        }
    }
}
