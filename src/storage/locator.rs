use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{RecordId, record::RecordLocation};

/// Maps live record ids to the slot holding their payload. Ordered by id so
/// scans come back in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLocator {
    locations: BTreeMap<RecordId, RecordLocation>,
}

impl RecordLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record_id: RecordId, location: RecordLocation) -> Option<RecordLocation> {
        self.locations.insert(record_id, location)
    }

    pub fn get(&self, record_id: RecordId) -> Option<RecordLocation> {
        self.locations.get(&record_id).copied()
    }

    pub fn remove(&mut self, record_id: RecordId) -> Option<RecordLocation> {
        self.locations.remove(&record_id)
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        self.locations.contains_key(&record_id)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, RecordLocation)> + '_ {
        self.locations.iter().map(|(&id, &location)| (id, location))
    }

    pub fn max_record_id(&self) -> Option<RecordId> {
        self.locations.keys().next_back().copied()
    }
}
