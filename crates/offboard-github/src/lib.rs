//! # GitHub Adapter
//!
//! Implements the source-control capability of `offboard-core` against the
//! GitHub REST API (public or Enterprise).
//!
//! - [`GitHubClient`] - Authenticated HTTP client: retries 429 and transient
//!   5xx responses with exponential backoff, follows `Link: rel="next"`
//!   pagination, maps 404 to not-found
//! - [`GitHubApi`] - [`SourceControlApi`](offboard_core::providers::SourceControlApi)
//!   implementation over the client
//!
//! The token is held as a [`secrecy::SecretString`] and never logged.

pub mod api;
pub mod client;
pub mod error;

pub use api::GitHubApi;
pub use client::{GitHubClient, DEFAULT_API_URL};
pub use error::{GitHubError, GitHubResult};
