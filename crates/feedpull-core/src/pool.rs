//! Bounded set of concurrent fetches.
//!
//! The pool keeps up to `2 * N` requests dispatched so the next request
//! is already waiting when a slot frees, but only `N` of them hold a
//! semaphore permit and touch the network at any moment. Tasks only
//! perform the fetch: they hand back a [`Completion`] and never see the
//! queue, the ledger, or the record store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::AppError;
use crate::models::FetchResponse;
use crate::queue::{RequestQueue, WorkItem};
use crate::traits::Fetcher;

/// Result of one fetch attempt, paired with the item that produced it.
#[derive(Debug)]
pub struct Completion {
    pub item: WorkItem,
    pub result: Result<FetchResponse, AppError>,
}

pub struct FetchPool<F: Fetcher> {
    fetcher: F,
    permits: Arc<Semaphore>,
    depth: usize,
    tasks: JoinSet<Completion>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl<F: Fetcher> FetchPool<F> {
    pub fn new(fetcher: F, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(concurrency)),
            depth: concurrency * 2,
            tasks: JoinSet::new(),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Dispatch from the front of `queue` until the pool is full or the
    /// queue is empty. Returns how many were dispatched.
    ///
    /// On a fresh pool this primes `min(2N, queue.len())` requests; after a
    /// completion it replaces the freed slot.
    pub fn fill_from(&mut self, queue: &mut RequestQueue) -> usize {
        let mut dispatched = 0;
        while self.tasks.len() < self.depth {
            let Some(item) = queue.pop() else { break };
            self.dispatch(item);
            dispatched += 1;
        }
        dispatched
    }

    fn dispatch(&mut self, item: WorkItem) {
        let fetcher = self.fetcher.clone();
        let permits = Arc::clone(&self.permits);
        let active = Arc::clone(&self.active);
        let peak = Arc::clone(&self.peak);

        self.tasks.spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let result = fetcher.fetch(item.url()).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    result
                }
                Err(_) => Err(AppError::WorkerFailed("fetch semaphore closed".into())),
            };
            Completion { item, result }
        });
    }

    /// Wait for any dispatched fetch to finish.
    ///
    /// `None` once nothing is outstanding.
    pub async fn next_completed(&mut self) -> Option<Result<Completion, AppError>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.map_err(|e| AppError::WorkerFailed(e.to_string())))
    }

    /// Requests dispatched and not yet handed back.
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }

    /// Most fetches that were ever on the network at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
