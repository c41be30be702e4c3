use std::future::Future;

use crate::error::AppError;
use crate::models::FetchResponse;

/// Performs one GET against the catalogue API.
///
/// `url` is either a path relative to the configured API host or an
/// absolute URL. Any status is returned as `Ok`; only failures that
/// produce no response at all are `Err`. Implementations must allow
/// many calls to be outstanding at once.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResponse, AppError>> + Send;
}

/// Supplies the bearer token used to authorise catalogue requests.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> impl Future<Output = Result<String, AppError>> + Send;
}
