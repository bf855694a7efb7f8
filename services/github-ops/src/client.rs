//! GitHub REST API client
//!
//! Thin wrapper over `reqwest` that adds authentication headers, rate-limit
//! backoff and status-to-error mapping. Every higher-level module goes
//! through these primitives; nothing else builds HTTP requests.

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{GitHubError, Result};
use crate::rate_limit::{is_rate_limited, now_epoch, retry_delay};

const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";

/// Page size for list endpoints
pub const PER_PAGE: u32 = 100;

/// Authenticated GitHub API client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

/// Status and body of a completed request
#[derive(Debug)]
struct RawResponse {
    status: StatusCode,
    body: String,
}

impl GitHubClient {
    /// Create a client authenticated with a token (PAT or installation token)
    pub fn new(token: impl Into<String>, config: &ClientConfig) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(GitHubError::Validation(
                "GitHub token must not be empty".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            token,
            retry: config.retry.clone(),
        })
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .header(ACCEPT, MEDIA_TYPE)
                .header("X-GitHub-Api-Version", API_VERSION);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, path = %path, attempt, "GitHub API request");
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;

            if is_rate_limited(status, &headers, &body) {
                if attempt >= self.retry.max_retries {
                    return Err(GitHubError::RateLimited {
                        attempts: attempt + 1,
                    });
                }
                let delay = retry_delay(&self.retry, attempt, &headers, now_epoch());
                warn!(
                    status = status.as_u16(),
                    path = %path,
                    delay_secs = delay.as_secs(),
                    "GitHub rate limit hit, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Ok(RawResponse { status, body });
        }
    }

    /// GET a mandatory resource; 404 becomes [`GitHubError::NotFound`]
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let raw = self.execute(Method::GET, path, &[], None).await?;
        decode(raw, path)
    }

    /// GET a resource that may legitimately be absent; 404 yields `None`
    pub async fn get_json_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let query: Vec<(&str, String)> = query.iter().map(|(k, v)| (*k, v.to_string())).collect();
        let raw = self.execute(Method::GET, path, &query, None).await?;
        if raw.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(raw, path).map(Some)
    }

    /// GET an optional setting; any non-success status yields `None`
    ///
    /// Transport failures and exhausted rate limits still propagate.
    pub async fn probe_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let raw = self.execute(Method::GET, path, &[], None).await?;
        if !raw.status.is_success() {
            debug!(status = raw.status.as_u16(), path = %path, "Optional endpoint unavailable");
            return Ok(None);
        }
        decode(raw, path).map(Some)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_value(body)?;
        let raw = self.execute(Method::POST, path, &[], Some(&body)).await?;
        decode(raw, path)
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_value(body)?;
        let raw = self.execute(Method::PATCH, path, &[], Some(&body)).await?;
        decode(raw, path)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let raw = self.execute(Method::DELETE, path, &[], None).await?;
        check_status(&raw, path)
    }

    /// Collect every item of a list endpoint, `page=1..` until an empty page
    pub async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut params: Vec<(&str, String)> =
                query.iter().map(|(k, v)| (*k, v.to_string())).collect();
            params.push(("per_page", PER_PAGE.to_string()));
            params.push(("page", page.to_string()));

            let raw = self.execute(Method::GET, path, &params, None).await?;
            let batch: Vec<T> = decode(raw, path)?;
            if batch.is_empty() {
                break;
            }
            debug!(path = %path, page, count = batch.len(), "Fetched page");
            items.extend(batch);
            page += 1;
        }

        Ok(items)
    }
}

fn to_value<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| GitHubError::Decode(e.to_string()))
}

fn check_status(raw: &RawResponse, path: &str) -> Result<()> {
    if raw.status == StatusCode::NOT_FOUND {
        return Err(GitHubError::NotFound(path.to_string()));
    }
    if !raw.status.is_success() {
        return Err(GitHubError::Http {
            status: raw.status.as_u16(),
            message: api_message(&raw.body),
        });
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(raw: RawResponse, path: &str) -> Result<T> {
    check_status(&raw, path)?;
    serde_json::from_str(&raw.body).map_err(|e| GitHubError::Decode(format!("{path}: {e}")))
}

/// Extract GitHub's `message` field from an error body, or the raw text
fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
