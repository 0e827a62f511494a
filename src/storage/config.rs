//! Table configuration.

use serde::{Deserialize, Serialize};

use crate::types::{
    DEFAULT_PAGE_CAPACITY, DEFAULT_SLOT_SIZE, MAX_PAGE_CAPACITY, MIN_SLOT_SIZE,
    error::{DatabaseError, Result},
};

/// Configuration for a table's page geometry and write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Size in bytes of each page's data region. Shared by all pages.
    pub page_capacity: usize,
    /// Size in bytes of every slot, including the payload length prefix.
    pub slot_size: usize,
    /// Flush dirty pages and the catalog after every successful mutation.
    pub sync_on_write: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_capacity: DEFAULT_PAGE_CAPACITY,
            slot_size: DEFAULT_SLOT_SIZE,
            sync_on_write: false,
        }
    }
}

impl TableConfig {
    /// Creates a configuration with the given geometry.
    pub fn new(page_capacity: usize, slot_size: usize) -> Self {
        Self {
            page_capacity,
            slot_size,
            ..Self::default()
        }
    }

    /// Sets the page capacity.
    pub fn with_page_capacity(mut self, page_capacity: usize) -> Self {
        self.page_capacity = page_capacity;
        self
    }

    /// Sets the slot size.
    pub fn with_slot_size(mut self, slot_size: usize) -> Self {
        self.slot_size = slot_size;
        self
    }

    /// Enables or disables flushing after every mutation.
    pub fn with_sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }

    /// Number of slots a single page holds.
    pub fn slots_per_page(&self) -> usize {
        self.page_capacity / self.slot_size
    }

    pub fn validate(&self) -> Result<()> {
        validate_geometry(self.page_capacity, self.slot_size)
    }
}

pub(crate) fn validate_geometry(page_capacity: usize, slot_size: usize) -> Result<()> {
    if slot_size < MIN_SLOT_SIZE {
        return Err(DatabaseError::InvalidConfig {
            reason: format!("slot size {slot_size} is below the minimum of {MIN_SLOT_SIZE}"),
        });
    }
    if page_capacity > MAX_PAGE_CAPACITY {
        return Err(DatabaseError::InvalidConfig {
            reason: format!(
                "page capacity {page_capacity} exceeds the maximum of {MAX_PAGE_CAPACITY}"
            ),
        });
    }
    if page_capacity < slot_size {
        return Err(DatabaseError::InvalidConfig {
            reason: format!("page capacity {page_capacity} cannot hold a {slot_size}-byte slot"),
        });
    }
    Ok(())
}
