//! Catalogue API hosts and path templates.

use crate::config::LibrarySelector;

pub const PROD_BASE_URL: &str = "https://api.overdrive.com";
pub const QA_BASE_URL: &str = "https://integration.api.overdrive.com";
pub const TOKEN_ENDPOINT: &str = "https://oauth.overdrive.com/token";

pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const DEFAULT_SORT: &str = "popularity:desc";

/// Path of the library (or Advantage account) record holding the collection token.
pub fn library_path(library: &LibrarySelector) -> String {
    match &library.parent_library_id {
        Some(parent) => format!(
            "/v1/libraries/{parent}/advantageAccounts/{}",
            library.library_id
        ),
        None => format!("/v1/libraries/{}", library.library_id),
    }
}

/// Product listing path for a collection.
///
/// `offset` is omitted for the discovery request, which only reads the
/// totals.
pub fn products_path(
    collection_token: &str,
    sort: &str,
    limit: u32,
    offset: Option<u64>,
) -> String {
    let mut path = format!("/v1/collections/{collection_token}/products?sort={sort}&limit={limit}");
    if let Some(offset) = offset {
        path.push_str(&format!("&offset={offset}"));
    }
    path
}

/// Make an absolute link relative to `base_url` when it lives on that host.
///
/// Links on other hosts come back unchanged.
pub fn strip_base_url<'a>(href: &'a str, base_url: &str) -> &'a str {
    let base = base_url.trim_end_matches('/');
    match href.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => rest,
        _ => href,
    }
}
