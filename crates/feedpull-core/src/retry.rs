//! Per-URL failure accounting.

use std::collections::HashMap;

/// Outcome of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the URL back in the queue; `failures` counts this one.
    Requeue { failures: u32 },
    /// The URL failed more often than the ceiling allows.
    Exhausted { failures: u32 },
}

/// Failure counts keyed by URL, kept for the whole run.
///
/// Counts only ever grow: a success leaves the entry as it was.
#[derive(Debug, Clone)]
pub struct RetryLedger {
    ceiling: u32,
    failures: HashMap<String, u32>,
}

impl RetryLedger {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            failures: HashMap::new(),
        }
    }

    /// Count a failed attempt for `url` and decide whether to try again.
    ///
    /// Up to `ceiling` failures are requeued; the next one exhausts the URL.
    pub fn record_failure(&mut self, url: &str) -> RetryDecision {
        let count = self.failures.entry(url.to_string()).or_insert(0);
        *count += 1;
        let failures = *count;
        if failures <= self.ceiling {
            tracing::debug!(%url, failures, ceiling = self.ceiling, "Retry scheduled");
            RetryDecision::Requeue { failures }
        } else {
            RetryDecision::Exhausted { failures }
        }
    }

    pub fn failures(&self, url: &str) -> u32 {
        self.failures.get(url).copied().unwrap_or(0)
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Sum of all recorded failures, which equals the retries issued
    /// plus any final exhausting failure.
    pub fn total_failures(&self) -> u64 {
        self.failures.values().map(|&n| u64::from(n)).sum()
    }

    /// URLs that failed at least once.
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.failures.iter().map(|(url, &n)| (url.as_str(), n))
    }
}
