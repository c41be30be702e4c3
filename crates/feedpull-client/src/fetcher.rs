use std::time::Duration;

use feedpull_core::error::AppError;
use feedpull_core::models::FetchResponse;
use feedpull_core::traits::Fetcher;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response};

/// User-Agent the catalogue API expects from us.
pub const USER_AGENT: &str = "Palace";

/// Per-request timeout when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Idle connections kept per host; comfortably above the default concurrency.
const POOL_IDLE_PER_HOST: usize = 50;

/// Authenticated HTTP transport for the catalogue API using reqwest.
///
/// Relative paths are resolved against the API host. Every request
/// carries the bearer token and the `Palace` User-Agent. Cloning is cheap
/// and clones share one connection pool, so concurrent fetches reuse
/// connections.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new(base_url: &str, bearer_token: &str) -> Result<Self, AppError> {
        Self::with_timeout(base_url, bearer_token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        bearer_token: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {bearer_token}"))
            .map_err(|e| AppError::HttpError(format!("Invalid bearer token: {e}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .pool_max_idle_per_host(POOL_IDLE_PER_HOST)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, AppError> {
        let target = self.resolve(url);
        tracing::trace!(%target, "GET");

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        read_response(url, response, self.timeout_secs).await
    }
}

/// Map a reqwest send failure onto the transient error variants.
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

/// Capture status, headers and body, whatever the status.
///
/// `url` is recorded as requested, not as redirected.
pub(crate) async fn read_response(
    url: &str,
    response: Response,
    timeout_secs: u64,
) -> Result<FetchResponse, AppError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            AppError::Timeout(timeout_secs)
        } else {
            AppError::HttpError(format!("Failed to read response body: {e}"))
        }
    })?;

    Ok(FetchResponse {
        url: url.to_string(),
        status,
        headers,
        body,
    })
}
