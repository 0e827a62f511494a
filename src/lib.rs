pub mod storage;
pub mod types;
pub mod utils;

pub use storage::{
    catalog::SystemCatalog,
    config::TableConfig,
    locator::RecordLocator,
    page_store::{FilePageStore, MemoryPageStore, PageStore},
    table::Table,
};
pub use types::{
    PageId, RecordId, SlotOffset,
    error::{DatabaseError, Result},
    page::Page,
    record::RecordLocation,
};
