//! Decide what a completed response carries from its request path.
//!
//! The path shape is the contract: listing pages live at
//! `/v1/collections/{token}/products`, per-item resources one level
//! below at `/{version}/collections/{token}/products/{id}/{resource}`.
//! Anything else is rejected.
//!
//! This is also the only place identifiers become [`ItemKey`]s.

use serde_json::{Map, Value};
use url::Url;

use crate::error::AppError;
use crate::models::{ItemKey, SubResource};

/// Logical kind of a response, derived from its path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Page,
    Sub(SubResource),
}

/// A classified response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Listing entries, keyed, in page order.
    Page(Vec<(ItemKey, Map<String, Value>)>),
    Sub {
        kind: SubResource,
        key: ItemKey,
        payload: Value,
    },
}

/// Map a request URL (relative or absolute) to its resource kind.
pub fn resource_kind(url: &str) -> Result<ResourceKind, AppError> {
    let unclassifiable = || AppError::Unclassifiable {
        url: url.to_string(),
    };

    let parsed = Url::parse("http://localhost/")
        .and_then(|base| base.join(url))
        .map_err(|_| unclassifiable())?;
    let segments: Vec<String> = parsed
        .path_segments()
        .map(|s| {
            s.filter(|seg| !seg.is_empty())
                .map(str::to_lowercase)
                .collect()
        })
        .unwrap_or_default();
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    match segments.as_slice() {
        ["v1", "collections", _, "products"] => Ok(ResourceKind::Page),
        ["v1", "collections", _, "products", _, "metadata"] => {
            Ok(ResourceKind::Sub(SubResource::Metadata))
        }
        ["v1", "collections", _, "products", _, "availability"] => {
            Ok(ResourceKind::Sub(SubResource::Availability))
        }
        ["v2", "collections", _, "products", _, "availability"] => {
            Ok(ResourceKind::Sub(SubResource::AvailabilityV2))
        }
        _ => Err(unclassifiable()),
    }
}

/// Classify a successful response and extract the item key(s).
pub fn classify(url: &str, body: Value) -> Result<Classified, AppError> {
    match resource_kind(url)? {
        ResourceKind::Page => classify_page(url, body),
        ResourceKind::Sub(kind) => {
            let key = extract_key(url, &body, kind.id_field())?;
            Ok(Classified::Sub {
                kind,
                key,
                payload: body,
            })
        }
    }
}

fn classify_page(url: &str, body: Value) -> Result<Classified, AppError> {
    let products = match body {
        Value::Object(mut map) => map.remove("products"),
        _ => return Err(malformed(url, "listing body is not an object")),
    };
    // Pages past the end of the collection omit `products` entirely.
    let products = match products {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(products)) => products,
        Some(_) => return Err(malformed(url, "'products' is not an array")),
    };

    products
        .into_iter()
        .map(|product| {
            let key = extract_key(url, &product, "id")?;
            match product {
                Value::Object(listing) => Ok((key, listing)),
                _ => Err(malformed(url, "product is not an object")),
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Classified::Page)
}

fn extract_key(url: &str, body: &Value, field: &str) -> Result<ItemKey, AppError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(ItemKey::new)
        .ok_or_else(|| malformed(url, &format!("missing string field '{field}'")))
}

fn malformed(url: &str, reason: &str) -> AppError {
    AppError::MalformedPayload {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
