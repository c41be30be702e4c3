use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FailedResponse;

/// Canonical identity of a catalogue item.
///
/// The only constructor lower-cases its input, so two spellings of the
/// same identifier always land on the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-item follow-up resources attached to a listing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResource {
    Metadata,
    Availability,
    AvailabilityV2,
}

impl SubResource {
    /// Name of the slot in the output record, and of the link in the listing.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubResource::Metadata => "metadata",
            SubResource::Availability => "availability",
            SubResource::AvailabilityV2 => "availabilityV2",
        }
    }

    /// Body field carrying the item identifier.
    ///
    /// The v2 availability resource reports identity as `reserveId`.
    pub fn id_field(&self) -> &'static str {
        match self {
            SubResource::Metadata | SubResource::Availability => "id",
            SubResource::AvailabilityV2 => "reserveId",
        }
    }
}

impl fmt::Display for SubResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merged result for one item: the listing payload plus any sub-resources.
///
/// Serializes as the listing object with the sub-resource payloads added
/// as sibling keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeRecord {
    #[serde(flatten)]
    listing: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    availability: Option<Value>,
    #[serde(rename = "availabilityV2", skip_serializing_if = "Option::is_none")]
    availability_v2: Option<Value>,
}

impl CompositeRecord {
    pub fn new(listing: Map<String, Value>) -> Self {
        Self {
            listing,
            metadata: None,
            availability: None,
            availability_v2: None,
        }
    }

    pub fn listing(&self) -> &Map<String, Value> {
        &self.listing
    }

    pub(crate) fn replace_listing(&mut self, listing: Map<String, Value>) {
        self.listing = listing;
    }

    pub fn sub_resource(&self, kind: SubResource) -> Option<&Value> {
        match kind {
            SubResource::Metadata => self.metadata.as_ref(),
            SubResource::Availability => self.availability.as_ref(),
            SubResource::AvailabilityV2 => self.availability_v2.as_ref(),
        }
    }

    pub(crate) fn attach(&mut self, kind: SubResource, payload: Value) {
        let slot = match kind {
            SubResource::Metadata => &mut self.metadata,
            SubResource::Availability => &mut self.availability,
            SubResource::AvailabilityV2 => &mut self.availability_v2,
        };
        *slot = Some(payload);
    }
}

/// What the transport hands back for one request, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn into_failure(self) -> FailedResponse {
        FailedResponse {
            url: self.url,
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}
