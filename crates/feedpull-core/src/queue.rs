//! Ordered list of URLs waiting for a fetch attempt.

use std::collections::VecDeque;

use crate::config::RetryPlacement;

/// One pending fetch.
///
/// Identity is the normalized URL; the attempt count lives in the
/// [`RetryLedger`](crate::retry::RetryLedger), not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    url: String,
}

impl WorkItem {
    pub fn new(url: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim().to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// FIFO work list owned by the run loop.
///
/// Retries can jump the line with [`requeue`](Self::requeue).
#[derive(Debug, Default)]
pub struct RequestQueue {
    items: VecDeque<WorkItem>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = WorkItem>) {
        self.items.extend(items);
    }

    /// Put a failed item back according to the retry placement policy.
    pub fn requeue(&mut self, item: WorkItem, placement: RetryPlacement) {
        match placement {
            RetryPlacement::Front => self.items.push_front(item),
            RetryPlacement::Back => self.items.push_back(item),
        }
    }

    pub fn pop(&mut self) -> Option<WorkItem> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
