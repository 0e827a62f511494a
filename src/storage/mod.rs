pub mod catalog;
pub mod config;
pub mod header;
pub mod locator;
pub mod page_store;
pub mod table;

const SEQUEL_HEADER_SIZE: usize = 100;
const SEQUEL_MAGIC: &[u8; 16] = b"SEQUEL PAGES v1\0";
const CATALOG_MAGIC: &[u8; 8] = b"SEQLCAT1";
const SEQUEL_FORMAT_VERSION: u8 = 1;

pub const PAGE_FILE_NAME: &str = "pages.db";
pub const CATALOG_FILE_NAME: &str = "syscat.bin";
