use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    storage::{CATALOG_MAGIC, config::TableConfig, locator::RecordLocator},
    types::{
        CHECKSUM_SIZE, FIRST_PAGE_ID, FIRST_RECORD_ID, PageId, RecordId,
        error::{DatabaseError, Result},
    },
    utils::hash::calculate_checksum,
};

/// Per-table metadata: the record id counter and the pages known to have room
/// for at least one more record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemCatalog {
    table_name: String,
    next_record_id: RecordId,
    next_page_id: PageId,
    total_pages: u64,
    free_page_list: Vec<PageId>,
    created_at: i64,
}

impl SystemCatalog {
    pub fn new(table_name: &str) -> Self {
        Self::starting_at(table_name, FIRST_RECORD_ID)
    }

    /// Catalog whose first assigned record id is `first_record_id`.
    pub fn starting_at(table_name: &str, first_record_id: RecordId) -> Self {
        Self {
            table_name: table_name.to_string(),
            next_record_id: first_record_id,
            next_page_id: FIRST_PAGE_ID,
            total_pages: 0,
            free_page_list: Vec::new(),
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn next_record_id(&self) -> RecordId {
        self.next_record_id
    }

    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn free_pages(&self) -> &[PageId] {
        &self.free_page_list
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.created_at)
    }

    /// The id the next insert will receive, without consuming it.
    pub fn peek_record_id(&self) -> Result<RecordId> {
        if self.next_record_id == RecordId::MAX {
            return Err(DatabaseError::RecordIdExhausted);
        }
        Ok(self.next_record_id)
    }

    /// Consumes the next record id. The counter only ever moves forward.
    pub fn allocate_record_id(&mut self) -> Result<RecordId> {
        let record_id = self.peek_record_id()?;
        self.next_record_id = record_id + 1;
        Ok(record_id)
    }

    pub fn allocate_page_id(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        self.total_pages += 1;
        debug!(table = %self.table_name, page_id, "allocated page");
        page_id
    }

    /// Oldest page still known to have room.
    pub fn first_free_page(&self) -> Option<PageId> {
        self.free_page_list.first().copied()
    }

    pub fn is_free_page(&self, page_id: PageId) -> bool {
        self.free_page_list.contains(&page_id)
    }

    /// Appends `page_id` unless it is already listed. Returns whether the list changed.
    pub fn add_free_page(&mut self, page_id: PageId) -> bool {
        if self.is_free_page(page_id) {
            return false;
        }
        self.free_page_list.push(page_id);
        debug!(table = %self.table_name, page_id, "page entered free page list");
        true
    }

    /// Drops `page_id` from the list. Returns whether the list changed.
    pub fn remove_free_page(&mut self, page_id: PageId) -> bool {
        match self.free_page_list.iter().position(|&id| id == page_id) {
            Some(index) => {
                self.free_page_list.remove(index);
                debug!(table = %self.table_name, page_id, "page left free page list");
                true
            }
            None => false,
        }
    }

    /// Brings the membership of `page_id` in line with whether it has room.
    pub fn set_free_page(&mut self, page_id: PageId, has_free_capacity: bool) -> bool {
        if has_free_capacity {
            self.add_free_page(page_id)
        } else {
            self.remove_free_page(page_id)
        }
    }
}

#[derive(Serialize)]
struct CatalogImageRef<'a> {
    config: &'a TableConfig,
    catalog: &'a SystemCatalog,
    locator: &'a RecordLocator,
}

#[derive(Deserialize)]
struct CatalogImage {
    config: TableConfig,
    catalog: SystemCatalog,
    locator: RecordLocator,
}

/// Encodes the catalog file: magic, CRC32 of the body, then the bincode body.
pub fn encode_catalog(
    config: &TableConfig,
    catalog: &SystemCatalog,
    locator: &RecordLocator,
) -> Result<Vec<u8>> {
    let image = CatalogImageRef {
        config,
        catalog,
        locator,
    };
    let body = bincode::serde::encode_to_vec(&image, bincode::config::standard()).map_err(
        |err| DatabaseError::SerializationError {
            details: err.to_string(),
        },
    )?;

    let mut buffer = Vec::with_capacity(CATALOG_MAGIC.len() + CHECKSUM_SIZE + body.len());
    buffer.extend_from_slice(CATALOG_MAGIC);
    buffer.extend_from_slice(&calculate_checksum(&body).to_le_bytes());
    buffer.extend_from_slice(&body);
    Ok(buffer)
}

pub fn decode_catalog(bytes: &[u8]) -> Result<(TableConfig, SystemCatalog, RecordLocator)> {
    let prefix = CATALOG_MAGIC.len() + CHECKSUM_SIZE;
    if bytes.len() < prefix {
        return Err(DatabaseError::CorruptedDatabase {
            reason: "catalog file too short".to_string(),
        });
    }
    if &bytes[..CATALOG_MAGIC.len()] != CATALOG_MAGIC {
        return Err(DatabaseError::InvalidHeader {
            reason: "invalid catalog magic number".to_string(),
        });
    }

    let mut checksum_bytes = [0u8; CHECKSUM_SIZE];
    checksum_bytes.copy_from_slice(&bytes[CATALOG_MAGIC.len()..prefix]);
    let body = &bytes[prefix..];
    if calculate_checksum(body) != u32::from_le_bytes(checksum_bytes) {
        return Err(DatabaseError::CorruptedDatabase {
            reason: "catalog checksum mismatch".to_string(),
        });
    }

    let (image, _): (CatalogImage, usize) =
        bincode::serde::decode_from_slice(body, bincode::config::standard()).map_err(|err| {
            DatabaseError::SerializationError {
                details: err.to_string(),
            }
        })?;
    Ok((image.config, image.catalog, image.locator))
}

pub fn write_catalog_file(
    path: &Path,
    config: &TableConfig,
    catalog: &SystemCatalog,
    locator: &RecordLocator,
) -> Result<()> {
    let bytes = encode_catalog(config, catalog, locator)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

pub fn read_catalog_file(path: &Path) -> Result<(TableConfig, SystemCatalog, RecordLocator)> {
    let bytes = fs::read(path)?;
    decode_catalog(&bytes)
}
