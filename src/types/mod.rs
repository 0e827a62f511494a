pub mod error;
pub mod page;
pub mod record;

// Common type aliases
pub type PageId = u64;
pub type RecordId = u32;
pub type SlotOffset = u16;

// Page geometry defaults
pub const DEFAULT_PAGE_CAPACITY: usize = 4096;
pub const DEFAULT_SLOT_SIZE: usize = 64;
pub const MAX_PAGE_CAPACITY: usize = u16::MAX as usize;

pub const PAGE_HEADER_SIZE: usize = 20; // page_id(8) + end(2) + head(2) + count(2) + slot(2) + crc(4)
pub const FREELIST_POINTER_SIZE: usize = 2; // next free offset (u16)
pub const SLOT_LENGTH_PREFIX_SIZE: usize = 2; // payload length (u16)
pub const MIN_SLOT_SIZE: usize = FREELIST_POINTER_SIZE;
pub const CHECKSUM_SIZE: usize = 4; // CRC32 checksum size

pub const FIRST_PAGE_ID: PageId = 1;
pub const FIRST_RECORD_ID: RecordId = 1;
