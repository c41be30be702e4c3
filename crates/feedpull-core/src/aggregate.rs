//! Keyed store merging listing entries and sub-resources into records.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::classify::Classified;
use crate::error::AppError;
use crate::models::{CompositeRecord, ItemKey, SubResource};

/// All records of a run, addressed by item key.
///
/// Entries are created by listing pages and never removed.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: HashMap<ItemKey, CompositeRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the record for `key`, or replace its listing payload.
    ///
    /// Sub-resources already attached are kept: an item can appear on two
    /// pages when the sort order shifts mid-harvest.
    pub fn upsert_listing(&mut self, key: ItemKey, listing: Map<String, Value>) {
        match self.records.get_mut(&key) {
            Some(record) => {
                tracing::debug!(%key, "Listing seen again, replacing");
                record.replace_listing(listing);
            }
            None => {
                self.records.insert(key, CompositeRecord::new(listing));
            }
        }
    }

    /// Attach a sub-resource to an existing record.
    ///
    /// A missing record means the payload arrived before its listing.
    pub fn attach(
        &mut self,
        key: &ItemKey,
        kind: SubResource,
        payload: Value,
    ) -> Result<(), AppError> {
        let record = self
            .records
            .get_mut(key)
            .ok_or_else(|| AppError::OrphanSubResource {
                kind,
                key: key.to_string(),
            })?;
        record.attach(kind, payload);
        Ok(())
    }

    /// Merge a classified response.
    pub fn merge(&mut self, classified: Classified) -> Result<(), AppError> {
        match classified {
            Classified::Page(products) => {
                for (key, listing) in products {
                    self.upsert_listing(key, listing);
                }
                Ok(())
            }
            Classified::Sub { kind, key, payload } => self.attach(&key, kind, payload),
        }
    }

    pub fn get(&self, key: &ItemKey) -> Option<&CompositeRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand over every record, in no particular order.
    pub fn into_records(self) -> Vec<CompositeRecord> {
        self.records.into_values().collect()
    }
}
