//! GitHub REST client with Link-header pagination and retry handling.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{GitHubError, GitHubResult};

/// Default public API base.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Maximum page size GitHub accepts.
pub const PER_PAGE: &str = "100";

const API_VERSION: &str = "2022-11-28";

/// GitHub error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// GitHub REST API client.
#[derive(Debug)]
pub struct GitHubClient {
    http_client: reqwest::Client,
    base_url: Url,
    token: SecretString,
    max_retries: u32,
    initial_backoff: Duration,
}

impl GitHubClient {
    /// Creates a new client for `base_url` (the public API or a GitHub
    /// Enterprise `/api/v3` root).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str, token: SecretString) -> GitHubResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(GitHubError::Config(format!(
                "{base_url} cannot be used as an API base"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("offboard/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GitHubError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            token,
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        })
    }

    /// Override the retry policy for transient statuses.
    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from percent-encoded path segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot hold a path.
    pub fn endpoint(&self, segments: &[&str]) -> GitHubResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GitHubError::Config(format!("{} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// First page of a listing endpoint, at the maximum page size.
    pub fn first_page(&self, segments: &[&str], query: &[(&str, &str)]) -> GitHubResult<Url> {
        let mut url = self.endpoint(segments)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("per_page", PER_PAGE);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Resolve a pagination cursor back into a URL on this API.
    ///
    /// # Errors
    ///
    /// Returns [`GitHubError::InvalidLink`] for links to another origin.
    pub fn cursor_url(&self, cursor: &str) -> GitHubResult<Url> {
        let url = Url::parse(cursor)?;
        if url.origin() != self.base_url.origin() {
            return Err(GitHubError::InvalidLink(cursor.to_string()));
        }
        Ok(url)
    }

    /// GET a JSON document.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> GitHubResult<T> {
        let response = self.send(Method::GET, url).await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// GET one page of a listing; returns the items and the `rel="next"`
    /// link, if any.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> GitHubResult<(Vec<T>, Option<String>)> {
        let response = self.send(Method::GET, url).await?;
        let response = Self::check(response).await?;
        let next = next_link(response.headers());
        let items: Vec<T> = response.json().await?;
        debug!(count = items.len(), has_next = next.is_some(), "Fetched page");
        Ok((items, next))
    }

    /// GET a membership-style endpoint: 2xx is `true`, 404 is `false`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn probe(&self, url: Url) -> GitHubResult<bool> {
        let response = self.send(Method::GET, url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response).await?;
        Ok(true)
    }

    /// DELETE a resource; 404 surfaces as [`GitHubError::NotFound`].
    #[instrument(skip_all, fields(url = %url))]
    pub async fn delete(&self, url: Url) -> GitHubResult<()> {
        let response = self.send(Method::DELETE, url).await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Send with retry on 429 and transient 5xx statuses.
    async fn send(&self, method: Method, url: Url) -> GitHubResult<Response> {
        let mut retries = 0;
        let mut delay = self.initial_backoff;

        loop {
            let response = self
                .http_client
                .request(method.clone(), url.clone())
                .bearer_auth(self.token.expose_secret())
                .send()
                .await?;
            let status = response.status();

            if !is_transient(status) {
                return Ok(response);
            }

            if retries >= self.max_retries {
                return Err(GitHubError::MaxRetriesExceeded {
                    attempts: retries,
                    status: status.as_u16(),
                });
            }

            let wait = retry_after(response.headers()).unwrap_or(delay);
            retries += 1;
            warn!(
                "Transient status {}, retry {}/{} after {:?}",
                status, retries, self.max_retries, wait
            );
            tokio::time::sleep(wait).await;
            delay *= 2;
        }
    }

    /// Turn a non-success response into an error.
    async fn check(response: Response) -> GitHubResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);

        Err(match status {
            StatusCode::NOT_FOUND => GitHubError::NotFound(url),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GitHubError::Unauthorized {
                status: status.as_u16(),
                message,
            },
            _ => GitHubError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Extract the `rel="next"` target from a Link header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(LINK)?.to_str().ok()?;
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if is_next {
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        } else {
            None
        }
    })
}
