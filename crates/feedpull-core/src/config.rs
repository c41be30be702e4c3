use std::fmt;

use crate::endpoints::{DEFAULT_PAGE_SIZE, DEFAULT_SORT, PROD_BASE_URL, QA_BASE_URL};
use crate::error::AppError;

/// Default number of concurrent fetches.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default number of failures a single URL may absorb before the run aborts.
pub const DEFAULT_RETRY_CEILING: u32 = 3;

const MIN_CONCURRENCY: usize = 1;
const MAX_CONCURRENCY: usize = 100;

/// Which API deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Qa,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => PROD_BASE_URL,
            Environment::Qa => QA_BASE_URL,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Qa => write!(f, "qa"),
        }
    }
}

/// Where a failed URL goes back into the request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPlacement {
    /// Ahead of all not-yet-attempted work.
    #[default]
    Front,
    /// Behind the existing backlog.
    Back,
}

/// The library whose collection is harvested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySelector {
    pub library_id: String,
    /// Set when `library_id` is an Advantage account of this parent.
    pub parent_library_id: Option<String>,
}

impl LibrarySelector {
    pub fn new(library_id: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            parent_library_id: None,
        }
    }

    pub fn advantage(library_id: impl Into<String>, parent_library_id: impl Into<String>) -> Self {
        Self {
            library_id: library_id.into(),
            parent_library_id: Some(parent_library_id.into()),
        }
    }
}

/// Tunables for a single harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// API host; stripped from item links so they can be fetched relative to it.
    pub base_url: String,
    /// Maximum number of fetches on the network at once.
    pub concurrency: usize,
    pub include_metadata: bool,
    /// Fetch both the v1 and v2 availability resources.
    pub include_availability: bool,
    pub retry_ceiling: u32,
    pub retry_placement: RetryPlacement,
    /// `limit` requested on the discovery page.
    pub page_size: u32,
    pub sort: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: PROD_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            include_metadata: false,
            include_availability: false,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            retry_placement: RetryPlacement::default(),
            page_size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

impl HarvestConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            base_url: environment.base_url().to_string(),
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    pub fn with_availability(mut self, include: bool) -> Self {
        self.include_availability = include;
        self
    }

    pub fn with_retry_placement(mut self, placement: RetryPlacement) -> Self {
        self.retry_placement = placement;
        self
    }

    /// Check ranges before any network work starts.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(AppError::InvalidConfig(format!(
                "concurrency {} must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}",
                self.concurrency
            )));
        }
        if self.page_size == 0 {
            return Err(AppError::InvalidConfig("page size must be positive".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(AppError::InvalidConfig("base URL is empty".into()));
        }
        Ok(())
    }

    /// Sub-resource requests produced for every listed item.
    pub fn follow_ups_per_item(&self) -> u64 {
        let mut n = 0;
        if self.include_metadata {
            n += 1;
        }
        if self.include_availability {
            n += 2;
        }
        n
    }
}
