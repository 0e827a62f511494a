use tracing::warn;

use crate::{
    storage::config::validate_geometry,
    types::{
        CHECKSUM_SIZE, PAGE_HEADER_SIZE, PageId, SLOT_LENGTH_PREFIX_SIZE, SlotOffset,
        error::{DatabaseError, Result},
    },
    utils::hash::{calculate_page_checksum, verify_page_checksum},
};

/*
 * Page Image on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (20 bytes)                       │
 * │  page_id(8) | end_of_page(2) | freelist_head(2) |               │
 * │  record_count(2) | slot_size(2) | checksum(4)                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    DATA REGION (capacity bytes)                 │
 * │  [slot 0] [slot 1] ... [slot n-1] | untouched space             │
 * │                                   ^ end_of_page                 │
 * └─────────────────────────────────────────────────────────────────┘
 *
 * Live slot:  [len(2)][payload ...][padding]
 * Free slot:  [next_free(2)][zeroes ...]
 *
 * Offsets are relative to the start of the data region. The freelist is a
 * LIFO chain threaded through free slots; `capacity` terminates it.
 */

const CHECKSUMMED_HEADER_SIZE: usize = PAGE_HEADER_SIZE - CHECKSUM_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_id: PageId,
    pub is_dirty: bool,

    capacity: usize,
    slot_size: usize,
    end_of_page: usize,
    freelist_head: usize,
    record_count: u16,

    data: Vec<u8>,
}

impl Page {
    pub fn new(page_id: PageId, capacity: usize, slot_size: usize) -> Result<Self> {
        validate_geometry(capacity, slot_size)?;
        Ok(Self {
            page_id,
            is_dirty: true,
            capacity,
            slot_size,
            end_of_page: 0,
            freelist_head: capacity,
            record_count: 0,
            data: vec![0; capacity],
        })
    }

    /// Size of the serialized page for the given data region capacity.
    pub fn image_size(capacity: usize) -> usize {
        PAGE_HEADER_SIZE + capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn end_of_page(&self) -> usize {
        self.end_of_page
    }

    /// Head of the freelist, `None` when the freelist is empty.
    pub fn freelist_head(&self) -> Option<SlotOffset> {
        if self.freelist_head == self.none() {
            None
        } else {
            Some(self.freelist_head as SlotOffset)
        }
    }

    pub fn record_count(&self) -> usize {
        self.record_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub fn max_payload_size(&self) -> usize {
        self.slot_size - SLOT_LENGTH_PREFIX_SIZE
    }

    pub fn has_free_capacity(&self) -> bool {
        self.freelist_head != self.none() || self.end_of_page + self.slot_size <= self.capacity
    }

    /// Stores `payload` in a free slot and returns its offset. Reclaimed slots
    /// are reused most-recently-freed first, then the tail grows.
    pub fn insert(&mut self, payload: &[u8]) -> Result<SlotOffset> {
        self.check_payload(payload)?;

        let target = if self.freelist_head != self.none() {
            let target = self.freelist_head;
            let next = self.read_u16(target) as usize;
            if next != self.none() && !self.is_slot_below_end(next) {
                warn!(page_id = self.page_id, slot = target, next, "freelist link out of range");
                return Err(DatabaseError::inconsistency(
                    Some(self.page_id),
                    format!("freelist slot {target} links to invalid offset {next}"),
                ));
            }
            self.freelist_head = next;
            target
        } else if self.end_of_page + self.slot_size <= self.capacity {
            let target = self.end_of_page;
            self.end_of_page += self.slot_size;
            target
        } else {
            return Err(DatabaseError::PageFull {
                page_id: self.page_id,
            });
        };

        self.write_slot(target, payload);
        self.record_count += 1;
        self.is_dirty = true;
        Ok(target as SlotOffset)
    }

    /// Releases the slot at `offset`. The tail slot is handed back to the
    /// untouched region, any other slot is pushed onto the freelist.
    pub fn remove(&mut self, offset: SlotOffset) -> Result<()> {
        let offset = offset as usize;
        self.check_live(offset)?;

        self.data[offset..offset + self.slot_size].fill(0);
        if offset + self.slot_size == self.end_of_page {
            self.end_of_page -= self.slot_size;
        } else {
            self.write_u16(offset, self.freelist_head as u16);
            self.freelist_head = offset;
        }

        self.record_count -= 1;
        self.is_dirty = true;
        Ok(())
    }

    /// Payload stored in the live slot at `offset`.
    pub fn read(&self, offset: SlotOffset) -> Result<&[u8]> {
        let offset = offset as usize;
        self.check_live(offset)?;
        self.payload_at(offset)
    }

    /// Overwrites the payload of the live slot at `offset` in place.
    pub fn update(&mut self, offset: SlotOffset, payload: &[u8]) -> Result<()> {
        let offset = offset as usize;
        self.check_payload(payload)?;
        self.check_live(offset)?;

        self.write_slot(offset, payload);
        self.is_dirty = true;
        Ok(())
    }

    /// Walks the freelist from its head. A chain that does not terminate, or
    /// that links to a misaligned offset or past `end_of_page`, is reported as
    /// an inconsistency.
    pub fn free_slots(&self) -> Result<Vec<SlotOffset>> {
        let max_steps = self.capacity / self.slot_size;
        let mut slots = Vec::new();
        let mut current = self.freelist_head;

        while current != self.none() {
            if slots.len() >= max_steps {
                return Err(DatabaseError::inconsistency(
                    Some(self.page_id),
                    format!("freelist does not terminate within {max_steps} steps"),
                ));
            }
            if !self.is_slot_below_end(current) {
                return Err(DatabaseError::inconsistency(
                    Some(self.page_id),
                    format!("freelist links to invalid offset {current}"),
                ));
            }
            slots.push(current as SlotOffset);
            current = self.read_u16(current) as usize;
        }

        Ok(slots)
    }

    /// Offsets of all live slots, ascending.
    pub fn live_offsets(&self) -> Result<Vec<SlotOffset>> {
        let mut is_free = vec![false; self.end_of_page / self.slot_size];
        for offset in self.free_slots()? {
            is_free[offset as usize / self.slot_size] = true;
        }
        Ok(is_free
            .iter()
            .enumerate()
            .filter(|(_, free)| !**free)
            .map(|(index, _)| (index * self.slot_size) as SlotOffset)
            .collect())
    }

    /// Payload at `offset` without walking the freelist. Only for offsets the
    /// record locator resolved; liveness is established by `Table::verify`.
    pub(crate) fn read_located(&self, offset: SlotOffset) -> Result<&[u8]> {
        let offset = offset as usize;
        if !self.is_slot_below_end(offset) {
            return Err(DatabaseError::InvalidOffset {
                page_id: self.page_id,
                offset,
            });
        }
        self.payload_at(offset)
    }

    /// Serialize the page to bytes following the documented layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; Self::image_size(self.capacity)];
        let mut offset = 0;

        buffer[offset..offset + 8].copy_from_slice(&self.page_id.to_le_bytes());
        offset += 8;
        buffer[offset..offset + 2].copy_from_slice(&(self.end_of_page as u16).to_le_bytes());
        offset += 2;
        buffer[offset..offset + 2].copy_from_slice(&(self.freelist_head as u16).to_le_bytes());
        offset += 2;
        buffer[offset..offset + 2].copy_from_slice(&self.record_count.to_le_bytes());
        offset += 2;
        buffer[offset..offset + 2].copy_from_slice(&(self.slot_size as u16).to_le_bytes());

        let checksum = calculate_page_checksum(&buffer[..CHECKSUMMED_HEADER_SIZE], &self.data);
        buffer[CHECKSUMMED_HEADER_SIZE..PAGE_HEADER_SIZE].copy_from_slice(&checksum.to_le_bytes());
        buffer[PAGE_HEADER_SIZE..].copy_from_slice(&self.data);

        buffer
    }

    /// Deserialize a page image. The geometry must match the table the page
    /// belongs to; header fields, checksum and freelist chain are validated.
    pub fn from_bytes(bytes: &[u8], capacity: usize, slot_size: usize) -> Result<Self> {
        validate_geometry(capacity, slot_size)?;
        let expected = Self::image_size(capacity);
        if bytes.len() != expected {
            return Err(DatabaseError::InvalidPageSize {
                expected,
                actual: bytes.len(),
            });
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize;
        let mut page_id_bytes = [0u8; 8];
        page_id_bytes.copy_from_slice(&bytes[0..8]);
        let page_id = PageId::from_le_bytes(page_id_bytes);
        let end_of_page = u16_at(8);
        let freelist_head = u16_at(10);
        let record_count = u16_at(12) as u16;
        let stored_slot_size = u16_at(14);
        let mut checksum_bytes = [0u8; CHECKSUM_SIZE];
        checksum_bytes.copy_from_slice(&bytes[CHECKSUMMED_HEADER_SIZE..PAGE_HEADER_SIZE]);
        let checksum = u32::from_le_bytes(checksum_bytes);

        let corrupted = |reason: String| DatabaseError::CorruptedPage { page_id, reason };

        if stored_slot_size != slot_size {
            return Err(corrupted(format!(
                "slot size {stored_slot_size} does not match table slot size {slot_size}"
            )));
        }
        if end_of_page > capacity || end_of_page % slot_size != 0 {
            return Err(corrupted(format!("invalid end_of_page: {end_of_page}")));
        }
        if !verify_page_checksum(
            &bytes[..CHECKSUMMED_HEADER_SIZE],
            &bytes[PAGE_HEADER_SIZE..],
            checksum,
        ) {
            return Err(corrupted("checksum mismatch".to_string()));
        }

        let page = Page {
            page_id,
            is_dirty: false,
            capacity,
            slot_size,
            end_of_page,
            freelist_head,
            record_count,
            data: bytes[PAGE_HEADER_SIZE..].to_vec(),
        };

        let free = page
            .free_slots()
            .map_err(|err| corrupted(format!("broken freelist: {err}")))?;
        let live = end_of_page / slot_size - free.len();
        if live != record_count as usize {
            return Err(corrupted(format!(
                "record count {record_count} does not match {live} live slots"
            )));
        }

        Ok(page)
    }

    fn none(&self) -> usize {
        self.capacity
    }

    fn is_slot_below_end(&self, offset: usize) -> bool {
        offset % self.slot_size == 0 && offset + self.slot_size <= self.end_of_page
    }

    fn payload_at(&self, offset: usize) -> Result<&[u8]> {
        let length = self.read_u16(offset) as usize;
        if length > self.max_payload_size() {
            return Err(DatabaseError::CorruptedPage {
                page_id: self.page_id,
                reason: format!("slot {offset} claims a {length}-byte payload"),
            });
        }
        let start = offset + SLOT_LENGTH_PREFIX_SIZE;
        Ok(&self.data[start..start + length])
    }

    fn check_payload(&self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload_size() {
            return Err(DatabaseError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size(),
            });
        }
        Ok(())
    }

    fn check_live(&self, offset: usize) -> Result<()> {
        let invalid = || DatabaseError::InvalidOffset {
            page_id: self.page_id,
            offset,
        };
        if !self.is_slot_below_end(offset) {
            return Err(invalid());
        }
        if self.free_slots()?.contains(&(offset as SlotOffset)) {
            return Err(invalid());
        }
        Ok(())
    }

    fn write_slot(&mut self, offset: usize, payload: &[u8]) {
        let slot = &mut self.data[offset..offset + self.slot_size];
        slot.fill(0);
        slot[..SLOT_LENGTH_PREFIX_SIZE].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        slot[SLOT_LENGTH_PREFIX_SIZE..SLOT_LENGTH_PREFIX_SIZE + payload.len()]
            .copy_from_slice(payload);
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
}
