use std::fmt;

use crate::classify::ResourceKind;

/// Lifecycle of a harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Collection lookup, page discovery, pool priming.
    Seeding,
    /// Dispatch, await, classify, requeue until nothing is left.
    Draining,
    Complete,
    Aborted,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Seeding => "seeding",
            RunPhase::Draining => "draining",
            RunPhase::Complete => "complete",
            RunPhase::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Complete | RunPhase::Aborted)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events emitted by the harvester for monitoring/logging.
#[derive(Debug, Clone)]
pub enum HarvestEvent<'a> {
    Phase {
        phase: RunPhase,
    },
    CollectionResolved {
        library_id: &'a str,
        collection_token: &'a str,
    },
    Planned {
        total_items: u64,
        pages: u64,
        requests: u64,
    },
    RequestCompleted {
        url: &'a str,
        kind: ResourceKind,
        completed: u64,
        planned: u64,
    },
    RequestFailed {
        url: &'a str,
        error: &'a str,
        failures: u32,
        will_retry: bool,
    },
    Finished {
        records: usize,
        retries: u64,
    },
}

/// Trait for receiving harvest events (decoupled logging).
pub trait HarvestReporter: Send + Sync {
    fn report(&self, event: HarvestEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl HarvestReporter for SilentReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHarvestReporter;

/// Info-level progress lines are emitted this often.
const PROGRESS_EVERY: u64 = 500;

impl HarvestReporter for TracingHarvestReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        match event {
            HarvestEvent::Phase { phase } if phase.is_terminal() => {
                tracing::info!(%phase, "Harvest ended");
            }
            HarvestEvent::Phase { phase } => {
                tracing::info!(%phase, "Harvest phase");
            }
            HarvestEvent::CollectionResolved {
                library_id,
                collection_token,
            } => {
                tracing::info!(%library_id, %collection_token, "Collection resolved");
            }
            HarvestEvent::Planned {
                total_items,
                pages,
                requests,
            } => {
                tracing::info!(%total_items, %pages, %requests, "Harvest planned");
            }
            HarvestEvent::RequestCompleted {
                url,
                kind,
                completed,
                planned,
            } => {
                tracing::debug!(%url, ?kind, %completed, %planned, "Request completed");
                if completed % PROGRESS_EVERY == 0 || completed == planned {
                    tracing::info!("Progress: {completed}/{planned} requests");
                }
            }
            HarvestEvent::RequestFailed {
                url,
                error,
                failures,
                will_retry,
            } => {
                tracing::warn!(%url, %error, %failures, %will_retry, "Request failed");
            }
            HarvestEvent::Finished { records, retries } => {
                tracing::info!(%records, %retries, "Harvest finished");
            }
        }
    }
}
