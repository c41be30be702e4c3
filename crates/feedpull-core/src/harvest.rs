//! Run orchestration: seed, drain, merge.
//!
//! ```text
//! SEEDING ──> DRAINING ──> COMPLETE
//!    │            │
//!    └────────────┴──────> ABORTED
//! ```
//!
//! All mutation of the queue, the retry ledger and the record store
//! happens here, on the single task that awaits pool completions. Fetch
//! tasks only run the network call.

use serde_json::Value;

use crate::aggregate::RecordStore;
use crate::classify::{Classified, ResourceKind, classify};
use crate::config::{HarvestConfig, LibrarySelector};
use crate::endpoints::{library_path, products_path};
use crate::error::AppError;
use crate::models::{CompositeRecord, FetchResponse};
use crate::pagination::{PagePlan, follow_ups, read_plan};
use crate::pool::{Completion, FetchPool};
use crate::queue::{RequestQueue, WorkItem};
use crate::report::{HarvestEvent, HarvestReporter, RunPhase};
use crate::retry::{RetryDecision, RetryLedger};
use crate::traits::Fetcher;

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStats {
    pub total_items: u64,
    pub planned_requests: u64,
    pub pages_fetched: u64,
    pub sub_resources_fetched: u64,
    pub retries: u64,
    pub peak_in_flight: usize,
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct HarvestReport {
    /// Merged records, in no particular order.
    pub records: Vec<CompositeRecord>,
    pub ledger: RetryLedger,
    pub stats: HarvestStats,
}

/// Mutable state owned by the run loop.
struct RunState {
    queue: RequestQueue,
    ledger: RetryLedger,
    store: RecordStore,
    stats: HarvestStats,
    completed: u64,
}

/// Harvests a whole collection through a [`Fetcher`].
///
/// Generic over the transport so the engine runs against an in-memory
/// catalogue in tests and against `reqwest` in production.
pub struct Harvester<F: Fetcher> {
    fetcher: F,
    config: HarvestConfig,
}

impl<F: Fetcher> Harvester<F> {
    pub fn new(fetcher: F, config: HarvestConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self { fetcher, config })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Run the whole job for one library.
    ///
    /// Any fatal error aborts immediately: outstanding fetches are
    /// cancelled and no records are returned.
    pub async fn run<R: HarvestReporter>(
        &self,
        library: &LibrarySelector,
        reporter: &R,
    ) -> Result<HarvestReport, AppError> {
        reporter.report(HarvestEvent::Phase {
            phase: RunPhase::Seeding,
        });

        let result = self.run_phases(library, reporter).await;

        let phase = if result.is_ok() {
            RunPhase::Complete
        } else {
            RunPhase::Aborted
        };
        reporter.report(HarvestEvent::Phase { phase });
        result
    }

    async fn run_phases<R: HarvestReporter>(
        &self,
        library: &LibrarySelector,
        reporter: &R,
    ) -> Result<HarvestReport, AppError> {
        let collection_token = self.resolve_collection(library).await?;
        reporter.report(HarvestEvent::CollectionResolved {
            library_id: &library.library_id,
            collection_token: &collection_token,
        });

        let mut ledger = RetryLedger::new(self.config.retry_ceiling);
        let plan = self
            .discover(&collection_token, &mut ledger, reporter)
            .await?;

        let pages = plan.page_count();
        let planned_requests = plan
            .total_items
            .saturating_mul(self.config.follow_ups_per_item())
            .saturating_add(pages);
        reporter.report(HarvestEvent::Planned {
            total_items: plan.total_items,
            pages,
            requests: planned_requests,
        });

        let mut queue = RequestQueue::new();
        queue.extend(plan.page_items(&collection_token, &self.config.sort));

        let mut state = RunState {
            queue,
            ledger,
            store: RecordStore::new(),
            stats: HarvestStats {
                total_items: plan.total_items,
                planned_requests,
                ..HarvestStats::default()
            },
            completed: 0,
        };
        self.drain(&mut state, reporter).await?;

        let RunState {
            ledger,
            store,
            stats,
            ..
        } = state;
        reporter.report(HarvestEvent::Finished {
            records: store.len(),
            retries: stats.retries,
        });
        Ok(HarvestReport {
            records: store.into_records(),
            ledger,
            stats,
        })
    }

    /// Look up the collection token scoping the product listing.
    ///
    /// Not retried: a failure here means bad credentials or a bad
    /// library id, neither of which a retry fixes.
    pub async fn resolve_collection(&self, library: &LibrarySelector) -> Result<String, AppError> {
        let path = library_path(library);
        let response = self.fetcher.fetch(&path).await?;
        if !response.is_success() {
            return Err(AppError::CollectionLookup(response.into_failure()));
        }
        let body = response.json()?;
        body.get("collectionToken")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::MalformedPayload {
                url: path,
                reason: "missing 'collectionToken'".into(),
            })
    }

    /// Fetch the first listing page and read the totals from it.
    async fn discover<R: HarvestReporter>(
        &self,
        collection_token: &str,
        ledger: &mut RetryLedger,
        reporter: &R,
    ) -> Result<PagePlan, AppError> {
        let url = products_path(
            collection_token,
            &self.config.sort,
            self.config.page_size,
            None,
        );
        loop {
            let error = match self.fetcher.fetch(&url).await {
                Ok(response) if response.is_success() => {
                    let body = parse_body(&response)?;
                    return read_plan(&url, &body, self.config.page_size);
                }
                Ok(response) => AppError::UnexpectedStatus(response.into_failure()),
                Err(e) => e,
            };
            absorb_failure(&url, error, ledger, reporter)?;
        }
    }

    async fn drain<R: HarvestReporter>(
        &self,
        state: &mut RunState,
        reporter: &R,
    ) -> Result<(), AppError> {
        let mut pool = FetchPool::new(self.fetcher.clone(), self.config.concurrency);
        pool.fill_from(&mut state.queue);
        reporter.report(HarvestEvent::Phase {
            phase: RunPhase::Draining,
        });

        while let Some(completion) = pool.next_completed().await {
            self.handle_completion(completion?, state, reporter)?;
            pool.fill_from(&mut state.queue);
        }

        state.stats.peak_in_flight = pool.peak_in_flight();
        Ok(())
    }

    fn handle_completion<R: HarvestReporter>(
        &self,
        completion: Completion,
        state: &mut RunState,
        reporter: &R,
    ) -> Result<(), AppError> {
        let Completion { item, result } = completion;

        let response = match result {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                let error = AppError::UnexpectedStatus(response.into_failure());
                return self.retry(item, error, state, reporter);
            }
            Err(error) => return self.retry(item, error, state, reporter),
        };

        let url = item.url();
        let classified = classify(url, parse_body(&response)?)?;
        let kind = match &classified {
            Classified::Page(_) => ResourceKind::Page,
            Classified::Sub { kind, .. } => ResourceKind::Sub(*kind),
        };

        // Follow-ups are queued only after their listing is in the store,
        // so a sub-resource can never complete ahead of its record.
        let derived = match &classified {
            Classified::Page(products) => {
                let mut derived = Vec::new();
                for (_, listing) in products {
                    let items = follow_ups(listing, &self.config).map_err(|reason| {
                        AppError::MalformedPayload {
                            url: url.to_string(),
                            reason,
                        }
                    })?;
                    derived.extend(items);
                }
                state.stats.pages_fetched += 1;
                derived
            }
            Classified::Sub { .. } => {
                state.stats.sub_resources_fetched += 1;
                Vec::new()
            }
        };
        state.store.merge(classified)?;
        state.queue.extend(derived);

        state.completed += 1;
        reporter.report(HarvestEvent::RequestCompleted {
            url,
            kind,
            completed: state.completed,
            planned: state.stats.planned_requests,
        });
        Ok(())
    }

    fn retry<R: HarvestReporter>(
        &self,
        item: WorkItem,
        error: AppError,
        state: &mut RunState,
        reporter: &R,
    ) -> Result<(), AppError> {
        absorb_failure(item.url(), error, &mut state.ledger, reporter)?;
        state.stats.retries += 1;
        state.queue.requeue(item, self.config.retry_placement);
        Ok(())
    }
}

/// Count a failed attempt in the ledger.
///
/// `Ok` means the caller should try again; non-transient errors and
/// exhausted URLs come back as the fatal error.
fn absorb_failure<R: HarvestReporter>(
    url: &str,
    error: AppError,
    ledger: &mut RetryLedger,
    reporter: &R,
) -> Result<(), AppError> {
    if !error.is_transient() {
        return Err(error);
    }
    let message = error.to_string();
    match ledger.record_failure(url) {
        RetryDecision::Requeue { failures } => {
            reporter.report(HarvestEvent::RequestFailed {
                url,
                error: &message,
                failures,
                will_retry: true,
            });
            Ok(())
        }
        RetryDecision::Exhausted { failures } => {
            reporter.report(HarvestEvent::RequestFailed {
                url,
                error: &message,
                failures,
                will_retry: false,
            });
            Err(AppError::RetriesExhausted {
                url: url.to_string(),
                attempts: failures,
                last_error: Box::new(error),
            })
        }
    }
}

fn parse_body(response: &FetchResponse) -> Result<Value, AppError> {
    response.json().map_err(|e| AppError::MalformedPayload {
        url: response.url.clone(),
        reason: format!("invalid JSON: {e}"),
    })
}
