//! Page planning and per-item follow-up links.

use serde_json::{Map, Value};

use crate::config::HarvestConfig;
use crate::endpoints::{products_path, strip_base_url};
use crate::error::AppError;
use crate::models::SubResource;
use crate::queue::WorkItem;

/// Totals read from the discovery page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    pub total_items: u64,
    pub per_page: u64,
}

impl PagePlan {
    /// `ceil(total / per_page)`, or zero when either side is zero.
    pub fn page_count(&self) -> u64 {
        if self.per_page == 0 || self.total_items == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.per_page)
    }

    /// Offsets of every page, 0-based and `per_page` apart.
    pub fn offsets(&self) -> impl Iterator<Item = u64> + '_ {
        let per_page = self.per_page;
        (0..self.page_count()).map(move |index| index * per_page)
    }

    /// One listing request per page.
    pub fn page_items(&self, collection_token: &str, sort: &str) -> Vec<WorkItem> {
        let limit = u32::try_from(self.per_page).unwrap_or(u32::MAX);
        self.offsets()
            .map(|offset| WorkItem::new(products_path(collection_token, sort, limit, Some(offset))))
            .collect()
    }
}

/// Follow-up requests for one listed product.
///
/// Metadata yields one link; availability yields the v1 and v2 links.
/// Each link has the configured API host stripped.
pub fn follow_ups(
    product: &Map<String, Value>,
    config: &HarvestConfig,
) -> Result<Vec<WorkItem>, String> {
    let links = product.get("links");
    let mut kinds = Vec::with_capacity(3);
    if config.include_metadata {
        kinds.push(SubResource::Metadata);
    }
    if config.include_availability {
        kinds.push(SubResource::Availability);
        kinds.push(SubResource::AvailabilityV2);
    }

    kinds
        .into_iter()
        .map(|kind| {
            let href = links
                .and_then(|l| l.pointer(&format!("/{}/href", kind.as_str())))
                .and_then(Value::as_str)
                .ok_or_else(|| format!("product has no '{kind}' link"))?;
            Ok(WorkItem::new(strip_base_url(href, &config.base_url)))
        })
        .collect()
}

/// Upper bound on listing pages in one run.
pub const MAX_PAGES: u64 = 100_000;

/// Read the discovery page totals.
///
/// `limit` falls back to the requested page size when the API omits it.
/// Totals that would need more than [`MAX_PAGES`] pages are rejected.
pub fn read_plan(url: &str, body: &Value, requested_limit: u32) -> Result<PagePlan, AppError> {
    let total_items = body
        .get("totalItems")
        .and_then(Value::as_u64)
        .ok_or_else(|| AppError::MalformedPayload {
            url: url.to_string(),
            reason: "missing 'totalItems'".into(),
        })?;
    let per_page = body
        .get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(u64::from(requested_limit));
    let plan = PagePlan {
        total_items,
        per_page,
    };
    if plan.page_count() > MAX_PAGES {
        return Err(AppError::MalformedPayload {
            url: url.to_string(),
            reason: format!(
                "implausible totals: {total_items} items at {per_page} per page \
                 exceeds {MAX_PAGES} pages"
            ),
        });
    }
    Ok(plan)
}
