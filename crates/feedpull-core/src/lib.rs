pub mod aggregate;
pub mod classify;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod harvest;
pub mod models;
pub mod pagination;
pub mod pool;
pub mod queue;
pub mod report;
pub mod retry;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{Environment, HarvestConfig, LibrarySelector, RetryPlacement};
pub use error::{AppError, FailedResponse};
pub use harvest::{HarvestReport, HarvestStats, Harvester};
pub use models::{CompositeRecord, FetchResponse, ItemKey, SubResource};
pub use report::{HarvestReporter, RunPhase, SilentReporter, TracingHarvestReporter};
pub use traits::{Fetcher, TokenProvider};
