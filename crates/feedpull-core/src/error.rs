use std::fmt;

use thiserror::Error;

use crate::models::SubResource;

/// A non-2xx response captured for diagnostics.
///
/// Fatal conditions print this verbatim before the process exits, so
/// it keeps everything the operator needs: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl FailedResponse {
    /// Render the multi-line diagnostic shown on fatal errors.
    pub fn diagnostic(&self) -> String {
        let headers: serde_json::Map<String, serde_json::Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        let headers = serde_json::to_string_pretty(&headers).unwrap_or_default();
        format!(
            "Error: {}\nHeaders: {}\n{}",
            self.status, headers, self.body
        )
    }
}

impl fmt::Display for FailedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} for {}", self.status, self.url)
    }
}

/// Application-wide error types for feedpull.
#[derive(Error, Debug)]
pub enum AppError {
    /// The token endpoint rejected the client credentials.
    #[error("Authentication failed: {0}")]
    Auth(FailedResponse),

    /// The library lookup did not yield a collection token.
    #[error("Collection lookup failed: {0}")]
    CollectionLookup(FailedResponse),

    /// A page or sub-resource request returned a non-2xx status.
    #[error("Unexpected status: {0}")]
    UnexpectedStatus(FailedResponse),

    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// A single URL failed more often than the retry ceiling allows.
    #[error("Retries exhausted for {url} after {attempts} failed attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: Box<AppError>,
    },

    /// A completed request's path matches none of the known resource shapes.
    #[error("Unclassifiable response for {url}")]
    Unclassifiable { url: String },

    /// A sub-resource arrived for an item that has no listing record.
    #[error("Orphan {kind} payload for item '{key}': no listing record")]
    OrphanSubResource { kind: SubResource, key: String },

    /// A 2xx response body did not have the expected structure.
    #[error("Malformed payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration values out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A fetch task panicked or was cancelled.
    #[error("Fetch worker failed: {0}")]
    WorkerFailed(String),
}

impl AppError {
    /// Returns true for per-request failures that the retry controller may absorb.
    ///
    /// Everything else aborts the run on first sight.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::UnexpectedStatus(_)
                | AppError::HttpError(_)
                | AppError::NetworkError(_)
                | AppError::Timeout(_)
        )
    }

    /// The captured response behind this error, if there is one.
    ///
    /// Looks through `RetriesExhausted` to the last failure.
    pub fn failed_response(&self) -> Option<&FailedResponse> {
        match self {
            AppError::Auth(r) | AppError::CollectionLookup(r) | AppError::UnexpectedStatus(r) => {
                Some(r)
            }
            AppError::RetriesExhausted { last_error, .. } => last_error.failed_response(),
            _ => None,
        }
    }
}
