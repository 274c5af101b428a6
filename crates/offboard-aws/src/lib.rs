//! # AWS Adapters
//!
//! [`AwsIam`] and [`AwsSso`] implement the cloud IAM and cloud SSO
//! capabilities of `offboard-core` by driving the `aws` command-line tool
//! (v2) with JSON output. Credentials, profile and region resolution are the
//! tool's own.
//!
//! Service error codes printed on stderr (`NoSuchEntity`,
//! `ResourceNotFoundException`, `AccessDenied`, ...) are classified into
//! [`offboard_core::ApiError`] variants, and `NextToken` drives pagination.

pub mod error;
pub mod iam;
pub mod runner;
pub mod sso;

pub use error::{AwsCliError, AwsResult};
pub use iam::AwsIam;
pub use runner::AwsCli;
pub use sso::AwsSso;
