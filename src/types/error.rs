use thiserror::Error;

use crate::types::{PageId, RecordId};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page is full (page_id: {page_id})")]
    PageFull { page_id: PageId },

    #[error("Invalid slot offset {offset} in page {page_id}")]
    InvalidOffset { page_id: PageId, offset: usize },

    #[error("Record {record_id} not found")]
    RecordNotFound { record_id: RecordId },

    #[error("Catalog inconsistency (page_id: {page_id:?}): {reason}")]
    CatalogInconsistency {
        page_id: Option<PageId>,
        reason: String,
    },

    #[error("Record id space exhausted")]
    RecordIdExhausted,

    #[error("Payload of {size} bytes exceeds slot payload capacity of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid table configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Page {page_id} not found")]
    PageNotFound { page_id: PageId },

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Invalid page size: {expected} bytes, got {actual} bytes")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Corrupted page: page_id={page_id}, reason={reason}")]
    CorruptedPage { page_id: PageId, reason: String },

    #[error("Invalid file header: {reason}")]
    InvalidHeader { reason: String },

    #[error("Corrupted database: {reason}")]
    CorruptedDatabase { reason: String },

    /// The mutation is applied in memory; only the follow-up flush failed.
    #[error("Records {committed:?} were committed but the flush failed: {source}")]
    FlushAfterCommit {
        committed: Vec<RecordId>,
        #[source]
        source: Box<DatabaseError>,
    },
}

impl DatabaseError {
    pub(crate) fn inconsistency(page_id: Option<PageId>, reason: impl Into<String>) -> Self {
        DatabaseError::CatalogInconsistency {
            page_id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
