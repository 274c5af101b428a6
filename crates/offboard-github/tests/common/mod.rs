//! Shared wiremock helpers for GitHub adapter tests.

#![allow(dead_code)]

use std::time::Duration;

use offboard_github::{GitHubApi, GitHubClient};
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub const ORG: &str = "acme";

/// Client pointed at the mock server, with near-instant retries.
pub fn client_for(server: &MockServer) -> GitHubClient {
    GitHubClient::new(&server.uri(), SecretString::new("ghp_test".to_string()))
        .unwrap()
        .with_retry(3, Duration::from_millis(1))
}

pub fn api_for(server: &MockServer) -> GitHubApi {
    GitHubApi::new(client_for(server))
}

pub fn repo(name: &str) -> Value {
    json!({ "id": 1, "name": name, "full_name": format!("{ORG}/{name}"), "private": true })
}

pub fn team(slug: &str) -> Value {
    json!({ "id": 1, "slug": slug, "name": slug.to_uppercase() })
}

/// Serves a fixed item list in pages selected by the `page` query
/// parameter, with a `Link: rel="next"` header on every page but the last.
pub struct LinkPagedResponder {
    pub base: String,
    pub items: Vec<Value>,
    pub page_size: usize,
}

impl Respond for LinkPagedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let page: usize = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1);

        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.items.len());
        let body: Vec<Value> = self.items.get(start..end).unwrap_or_default().to_vec();

        let mut response = ResponseTemplate::new(200).set_body_json(body);
        if end < self.items.len() {
            response = response.insert_header(
                "Link",
                format!(
                    "<{}?per_page=100&type=all&page={}>; rel=\"next\"",
                    self.base,
                    page + 1
                )
                .as_str(),
            );
        }
        response
    }
}

pub fn github_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "message": message,
        "documentation_url": "https://docs.github.com/rest"
    }))
}
