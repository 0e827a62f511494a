use crate::{
    storage::{SEQUEL_FORMAT_VERSION, SEQUEL_HEADER_SIZE, SEQUEL_MAGIC},
    types::error::DatabaseError,
};

/// Fixed-size header at the start of a page file. Integers are big-endian.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFileHeader {
    pub magic: [u8; 16],
    pub file_format_version: u8,
    pub page_capacity: u32,
    pub slot_size: u32,
    pub page_count: u64,
    pub file_change_counter: u32,
}

impl PageFileHeader {
    pub fn new(page_capacity: usize, slot_size: usize) -> Self {
        Self {
            magic: *SEQUEL_MAGIC,
            file_format_version: SEQUEL_FORMAT_VERSION,
            page_capacity: page_capacity as u32,
            slot_size: slot_size as u32,
            page_count: 0,
            file_change_counter: 0,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(SEQUEL_HEADER_SIZE);

        buffer.extend_from_slice(&self.magic);
        buffer.push(self.file_format_version);
        buffer.extend_from_slice(&self.page_capacity.to_be_bytes());
        buffer.extend_from_slice(&self.slot_size.to_be_bytes());
        buffer.extend_from_slice(&self.page_count.to_be_bytes());
        buffer.extend_from_slice(&self.file_change_counter.to_be_bytes());

        buffer.resize(SEQUEL_HEADER_SIZE, 0);
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() < SEQUEL_HEADER_SIZE {
            return Err(DatabaseError::InvalidHeader {
                reason: "Header too short".to_string(),
            });
        }

        let mut offset = 0;

        let mut magic = [0u8; 16];
        magic.copy_from_slice(&bytes[offset..offset + 16]);
        if &magic != SEQUEL_MAGIC {
            return Err(DatabaseError::InvalidHeader {
                reason: "Invalid page file magic number".to_string(),
            });
        }
        offset += 16;

        let file_format_version = bytes[offset];
        if file_format_version != SEQUEL_FORMAT_VERSION {
            return Err(DatabaseError::InvalidHeader {
                reason: format!("Unsupported file format version: {}", file_format_version),
            });
        }
        offset += 1;

        let page_capacity = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);
        offset += 4;

        let slot_size = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);
        offset += 4;

        let mut page_count_bytes = [0u8; 8];
        page_count_bytes.copy_from_slice(&bytes[offset..offset + 8]);
        let page_count = u64::from_be_bytes(page_count_bytes);
        offset += 8;

        let file_change_counter = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]);

        Ok(Self {
            magic,
            file_format_version,
            page_capacity,
            slot_size,
            page_count,
            file_change_counter,
        })
    }
}
