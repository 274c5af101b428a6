//! Runs the `aws` command-line tool and decodes its JSON output.

use std::process::Stdio;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{parse_service_error, AwsCliError, AwsResult};

/// Items requested per page through `--max-items`.
pub const PAGE_SIZE: &str = "100";

/// Handle on the `aws` tool with a fixed profile and region.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    profile: Option<String>,
    region: Option<String>,
    timeout: Duration,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCli {
    pub fn new() -> Self {
        Self {
            program: "aws".to_string(),
            profile: None,
            region: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Use another executable (a wrapper script, or a test double).
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// `aws --version`, to check the tool is installed.
    pub async fn version(&self) -> AwsResult<String> {
        let output = self.output("--version", &["--version"]).await?;
        if !output.status.success() {
            return Err(AwsCliError::Failed {
                operation: "--version".to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        // Older releases print the version on stderr.
        let text = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&text).trim().to_string())
    }

    /// Run `aws <service> <operation> <args> --output json` and decode stdout.
    ///
    /// Empty output decodes as JSON `null`, which suits mutations that
    /// print nothing.
    pub async fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        operation: &str,
        args: &[&str],
    ) -> AwsResult<T> {
        let name = format!("{service} {operation}");
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 8);
        full.extend([service, operation]);
        full.extend_from_slice(args);
        full.extend(["--output", "json"]);
        if let Some(profile) = &self.profile {
            full.extend(["--profile", profile.as_str()]);
        }
        if let Some(region) = &self.region {
            full.extend(["--region", region.as_str()]);
        }

        let output = self.output(&name, &full).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(operation = %name, status = ?output.status.code(), "aws call failed");
            return Err(match parse_service_error(&stderr) {
                Some((code, message)) => AwsCliError::Service {
                    code,
                    operation: name,
                    message,
                },
                None => AwsCliError::Failed {
                    operation: name,
                    status: output.status.code(),
                    stderr,
                },
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let body = if stdout.trim().is_empty() {
            "null"
        } else {
            &*stdout
        };
        debug!(operation = %name, output_size = output.stdout.len(), "aws call succeeded");
        serde_json::from_str(body).map_err(|source| AwsCliError::Json {
            operation: name,
            source,
        })
    }

    /// Run a mutation whose output is ignored.
    pub async fn exec(&self, service: &str, operation: &str, args: &[&str]) -> AwsResult<()> {
        self.call::<serde_json::Value>(service, operation, args)
            .await
            .map(|_| ())
    }

    async fn output(&self, name: &str, args: &[&str]) -> AwsResult<std::process::Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("AWS_PAGER", "")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, operation = %name, "running aws");

        tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AwsCliError::Timeout {
                operation: name.to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| AwsCliError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

/// Append the CLI pagination flags for one page.
pub fn paged<'a>(mut args: Vec<&'a str>, cursor: &'a Option<String>) -> Vec<&'a str> {
    args.extend(["--max-items", PAGE_SIZE]);
    if let Some(token) = cursor {
        args.extend(["--starting-token", token.as_str()]);
    }
    args
}
