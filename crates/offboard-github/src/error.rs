//! Error types for the GitHub adapter.

use offboard_core::ApiError;
use thiserror::Error;

/// Result type alias using `GitHubError`.
pub type GitHubResult<T> = Result<T, GitHubError>;

/// Errors that can occur when talking to the GitHub REST API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Client configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token rejected or lacking scope.
    #[error("Authentication error ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transient failures persisted through every retry.
    #[error("Maximum retries ({attempts}) exceeded, last status {status}")]
    MaxRetriesExceeded { attempts: u32, status: u16 },

    /// A pagination link pointed somewhere unexpected.
    #[error("Invalid pagination link: {0}")]
    InvalidLink(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<GitHubError> for ApiError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::NotFound(resource) => ApiError::not_found(resource),
            GitHubError::Unauthorized { message, .. } => ApiError::Unauthorized { message },
            GitHubError::Api { status, message } => ApiError::rejected(Some(status), message),
            GitHubError::MaxRetriesExceeded { status, .. } => {
                ApiError::transport(err_message(status))
            }
            GitHubError::Http(e) => ApiError::transport_with_source("GitHub request failed", e),
            GitHubError::Json(e) => ApiError::invalid_response(format!("GitHub JSON: {e}")),
            GitHubError::InvalidLink(link) => {
                ApiError::invalid_response(format!("pagination link {link}"))
            }
            GitHubError::Config(message) => ApiError::invalid_response(message),
            GitHubError::Url(e) => ApiError::invalid_response(format!("GitHub URL: {e}")),
        }
    }
}

fn err_message(status: u16) -> String {
    format!("GitHub kept answering {status} after retries")
}
