//! Test utilities: in-memory fetchers.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use url::Url;

use crate::endpoints::PROD_BASE_URL;
use crate::error::AppError;
use crate::models::FetchResponse;
use crate::report::{HarvestEvent, HarvestReporter, RunPhase};
use crate::traits::Fetcher;

pub fn ok_json(url: &str, body: Value) -> FetchResponse {
    FetchResponse {
        url: url.to_string(),
        status: 200,
        headers: vec![("content-type".into(), "application/json".into())],
        body: body.to_string(),
    }
}

pub fn status(url: &str, status: u16, body: &str) -> FetchResponse {
    FetchResponse {
        url: url.to_string(),
        status,
        headers: vec![("x-request-id".into(), "test".into())],
        body: body.to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with scripted responses per URL.
///
/// Each call pops the next scripted result for its URL; the last one is
/// repeated. Unscripted URLs answer `200 {}`.
#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<HashMap<String, VecDeque<Result<FetchResponse, AppError>>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, response: FetchResponse) -> Self {
        self.script(url, Ok(response))
    }

    pub fn route_error(self, url: &str, error: AppError) -> Self {
        self.script(url, Err(error))
    }

    fn script(self, url: &str, result: Result<FetchResponse, AppError>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut routes = self.routes.lock().unwrap();
        let Some(script) = routes.get_mut(url) else {
            return Ok(ok_json(url, json!({})));
        };
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().map(clone_result)
        };
        next.unwrap_or_else(|| Ok(ok_json(url, json!({}))))
    }
}

fn clone_result(result: &Result<FetchResponse, AppError>) -> Result<FetchResponse, AppError> {
    match result {
        Ok(response) => Ok(response.clone()),
        Err(error) => Err(AppError::NetworkError(error.to_string())),
    }
}

// ---------------------------------------------------------------------------
// SimulatedCatalog
// ---------------------------------------------------------------------------

pub const SIM_COLLECTION_TOKEN: &str = "sim-collection";

/// An injected failure for one URL.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// No response at all.
    Transport,
    Status(u16),
}

/// In-memory catalogue API serving `total_items` products `ID-1..=ID-n`.
///
/// Answers the library lookup, listing pages (honouring `offset` and
/// `limit`), metadata, and both availability versions. Faults can be
/// injected per URL, and the peak number of concurrent calls is recorded.
#[derive(Clone)]
pub struct SimulatedCatalog {
    total_items: usize,
    page_limit: usize,
    base_url: String,
    latency: Duration,
    faults: Arc<Mutex<HashMap<String, VecDeque<Fault>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl SimulatedCatalog {
    pub fn new(total_items: usize) -> Self {
        Self {
            total_items,
            page_limit: 200,
            base_url: PROD_BASE_URL.to_string(),
            latency: Duration::ZERO,
            faults: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Largest page the API will serve, whatever `limit` is asked for.
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `times` requests for `url` with `fault`.
    pub fn fail(self, url: &str, fault: Fault, times: usize) -> Self {
        self.faults
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(std::iter::repeat_n(fault, times));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn product(&self, n: usize) -> Value {
        let id = format!("ID-{n}");
        let base = format!(
            "{}/v1/collections/{SIM_COLLECTION_TOKEN}/products/{id}",
            self.base_url
        );
        let base_v2 = format!(
            "{}/v2/collections/{SIM_COLLECTION_TOKEN}/products/{id}",
            self.base_url
        );
        json!({
            "id": id,
            "title": format!("Title {n}"),
            "links": {
                "metadata": {"href": format!("{base}/metadata")},
                "availability": {"href": format!("{base}/availability")},
                "availabilityV2": {"href": format!("{base_v2}/availability")},
            }
        })
    }

    fn respond(&self, url: &str) -> FetchResponse {
        let Ok(parsed) = Url::parse("http://localhost/").and_then(|b| b.join(url)) else {
            return status(url, 400, "bad url");
        };
        let query: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            ["v1", "libraries", _] | ["v1", "libraries", _, "advantageAccounts", _] => {
                ok_json(url, json!({"collectionToken": SIM_COLLECTION_TOKEN}))
            }
            ["v1", "collections", SIM_COLLECTION_TOKEN, "products"] => {
                let offset: usize = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
                let limit: usize = query
                    .get("limit")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(self.page_limit)
                    .min(self.page_limit);
                let products: Vec<Value> = (offset + 1..=self.total_items)
                    .take(limit)
                    .map(|n| self.product(n))
                    .collect();
                let mut body = json!({
                    "totalItems": self.total_items,
                    "limit": limit,
                    "offset": offset,
                });
                if !products.is_empty() {
                    body["products"] = Value::Array(products);
                }
                ok_json(url, body)
            }
            ["v1", "collections", SIM_COLLECTION_TOKEN, "products", id, "metadata"] => {
                ok_json(url, json!({"id": id, "publisher": "Sim Press"}))
            }
            ["v1", "collections", SIM_COLLECTION_TOKEN, "products", id, "availability"] => {
                ok_json(url, json!({"id": id, "available": true}))
            }
            ["v2", "collections", SIM_COLLECTION_TOKEN, "products", id, "availability"] => {
                ok_json(url, json!({"reserveId": id, "copiesOwned": 1}))
            }
            _ => status(url, 404, "not found"),
        }
    }
}

impl Fetcher for SimulatedCatalog {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, AppError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.calls.lock().unwrap().push(url.to_string());
        let fault = self
            .faults
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        match fault {
            Some(Fault::Transport) => Err(AppError::NetworkError(format!(
                "Connection failed: simulated reset for {url}"
            ))),
            Some(Fault::Status(code)) => Ok(status(url, code, "simulated failure")),
            None => Ok(self.respond(url)),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that keeps phase changes and failures for assertions.
#[derive(Default)]
pub struct RecordingReporter {
    phases: Mutex<Vec<RunPhase>>,
    failures: Mutex<Vec<(String, u32, bool)>>,
}

impl RecordingReporter {
    pub fn phases(&self) -> Vec<RunPhase> {
        self.phases.lock().unwrap().clone()
    }

    /// `(url, failures, will_retry)` per reported failure.
    pub fn failures(&self) -> Vec<(String, u32, bool)> {
        self.failures.lock().unwrap().clone()
    }
}

impl HarvestReporter for RecordingReporter {
    fn report(&self, event: HarvestEvent<'_>) {
        match event {
            HarvestEvent::Phase { phase } => self.phases.lock().unwrap().push(phase),
            HarvestEvent::RequestFailed {
                url,
                failures,
                will_retry,
                ..
            } => self
                .failures
                .lock()
                .unwrap()
                .push((url.to_string(), failures, will_retry)),
            _ => {}
        }
    }
}
