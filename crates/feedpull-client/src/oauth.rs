use std::time::Duration;

use feedpull_core::endpoints::TOKEN_ENDPOINT;
use feedpull_core::error::AppError;
use feedpull_core::traits::TokenProvider;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::fetcher::{DEFAULT_TIMEOUT, USER_AGENT, read_response, send_error};

const GRANT_BODY: &str = "grant_type=client_credentials";

/// Client-credentials token client for the catalogue API.
///
/// Exchanges the client key and secret for a bearer token with a single
/// `POST` to the token endpoint. Any non-2xx answer is an
/// [`AppError::Auth`] carrying the full failed response.
#[derive(Clone)]
pub struct OAuthTokenProvider {
    client: Client,
    token_url: String,
    client_key: String,
    client_secret: String,
    timeout_secs: u64,
}

impl OAuthTokenProvider {
    pub fn new(client_key: &str, client_secret: &str) -> Result<Self, AppError> {
        Self::with_token_url(client_key, client_secret, TOKEN_ENDPOINT)
    }

    pub fn with_token_url(
        client_key: &str,
        client_secret: &str,
        token_url: &str,
    ) -> Result<Self, AppError> {
        Self::build(client_key, client_secret, token_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(
            &self.client_key,
            &self.client_secret,
            &self.token_url,
            timeout,
        )
    }

    fn build(
        client_key: &str,
        client_secret: &str,
        token_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if client_key.is_empty() || client_secret.is_empty() {
            return Err(AppError::InvalidConfig(
                "client key and secret are required".into(),
            ));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            token_url: token_url.to_string(),
            client_key: client_key.to_string(),
            client_secret: client_secret.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl TokenProvider for OAuthTokenProvider {
    async fn bearer_token(&self) -> Result<String, AppError> {
        tracing::debug!(token_url = %self.token_url, "Requesting access token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_key, Some(&self.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(GRANT_BODY)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout_secs))?;

        let response = read_response(&self.token_url, response, self.timeout_secs).await?;
        if !response.is_success() {
            return Err(AppError::Auth(response.into_failure()));
        }

        let token: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| AppError::MalformedPayload {
                url: self.token_url.clone(),
                reason: format!("token response: {e}"),
            })?;
        Ok(token.access_token)
    }
}
