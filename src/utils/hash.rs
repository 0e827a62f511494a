use crc32fast::Hasher;

/// CRC32 over a page image: the checksummed header prefix followed by the
/// page's data region.
pub fn calculate_page_checksum(header: &[u8], data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(header);
    hasher.update(data);
    hasher.finalize()
}

pub fn verify_page_checksum(header: &[u8], data: &[u8], expected_checksum: u32) -> bool {
    calculate_page_checksum(header, data) == expected_checksum
}

pub fn calculate_checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}
