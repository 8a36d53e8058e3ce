//! `reqwest`-backed [`GitHubApi`] for the CLI.
//!
//! Pagination follows the `Link: <...>; rel="next"` header GitHub sends on
//! every listing page. Requests are sequential; there is no retry, caching, or
//! rate-limit handling.

use std::collections::HashMap;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};

use tally_core::config::Config;
use tally_core::{ApiError, ApiResponse, Endpoint, GitHubApi, RequestParams};

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Default `User-Agent` (GitHub rejects anonymous agents).
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A GitHub REST client.
#[derive(Debug, Clone)]
pub struct HttpGitHub {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    per_page: u32,
}

impl HttpGitHub {
    /// Build a client.
    ///
    /// `base_url` is the API root (`https://api.github.com`); a trailing
    /// slash is ignored.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        user_agent: &str,
        per_page: u32,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, token, per_page))
    }

    /// Wrap an already configured `reqwest` client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        token: Option<String>,
        per_page: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            per_page,
        }
    }

    /// Build a client from configuration. An explicit `token` wins over the
    /// configured one.
    pub fn from_config(config: &Config, token: Option<String>) -> Result<Self, ApiError> {
        let token = token.or_else(|| config.token().map(str::to_string));
        let user_agent = config
            .github
            .as_ref()
            .and_then(|g| g.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT);
        Self::new(config.api_url(), token, user_agent, config.per_page())
    }

    /// Whether requests are authenticated.
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url).header(ACCEPT, GITHUB_MEDIA_TYPE);
        match self.token {
            Some(ref token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::new(status.as_u16(), error_message(status, &body)))
    }
}

impl GitHubApi for HttpGitHub {
    async fn paginate(
        &self,
        endpoint: Endpoint,
        params: &RequestParams,
    ) -> Result<Vec<Value>, ApiError> {
        let (path, mut query) = endpoint.resolve(params);
        if !query.contains_key("per_page") {
            query.insert("per_page", self.per_page);
        }

        let mut records = Vec::new();
        let mut request = self.get(&format!("{}{path}", self.base_url)).query(&query.query_pairs());
        let mut pages = 0_usize;
        loop {
            let response = self.send(request).await?;
            pages += 1;
            let next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_link);

            if response.status() != StatusCode::NO_CONTENT {
                let page: Value = response
                    .json()
                    .await
                    .map_err(|e| ApiError::transport(format!("invalid JSON from {endpoint}: {e}")))?;
                match page {
                    Value::Array(items) => {
                        trace!(page = pages, records = items.len(), "fetched page");
                        records.extend(items);
                    }
                    other => {
                        return Err(ApiError::transport(format!(
                            "expected a JSON array from {endpoint}, got {other}"
                        )));
                    }
                }
            }

            // Next links already carry the full query string.
            match next {
                Some(url) => request = self.get(&url),
                None => break,
            }
        }

        debug!(%endpoint, pages, records = records.len(), "pagination complete");
        Ok(records)
    }

    async fn request(
        &self,
        endpoint: Endpoint,
        params: &RequestParams,
    ) -> Result<ApiResponse, ApiError> {
        let (path, query) = endpoint.resolve(params);
        let request = self
            .get(&format!("{}{path}", self.base_url))
            .query(&query.query_pairs());
        let response = self.send(request).await?;
        let status = response.status();
        debug!(%endpoint, status = status.as_u16(), "probe complete");
        Ok(ApiResponse {
            status: status.as_u16(),
            headers: lowercase_headers(response.headers(), status),
        })
    }
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|relation| {
        let (target, params) = relation.trim().split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim() == r#"rel="next""#);
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

/// GitHub's `message` field from an error body, or the status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status_line(status))
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

/// Copy headers with lowercased names, adding the legacy `status` header
/// (`"204 No Content"`) when the server did not send one.
fn lowercase_headers(headers: &HeaderMap, status: StatusCode) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();
    map.entry("status".to_string())
        .or_insert_with(|| status_line(status));
    map
}
