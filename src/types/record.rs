use serde::{Deserialize, Serialize};

use crate::types::{PageId, SlotOffset};

/// Where a record's payload lives: the owning page and the slot offset inside
/// that page's data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordLocation {
    pub page_id: PageId,
    pub offset: SlotOffset,
}

impl RecordLocation {
    pub fn new(page_id: PageId, offset: SlotOffset) -> Self {
        Self { page_id, offset }
    }
}
