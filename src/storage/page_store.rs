use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    storage::{SEQUEL_HEADER_SIZE, config::validate_geometry, header::PageFileHeader},
    types::{
        PageId,
        error::{DatabaseError, Result},
        page::Page,
    },
};

/// Page-file I/O backend. Pages are addressed by id, starting at 1, and are
/// allocated by writing the page right after the current last one.
pub trait PageStore {
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> Result<()>;

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> Result<()>;

    fn page_count(&self) -> u64;

    fn sync(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPageStore {
    pages: HashMap<PageId, Vec<u8>>,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageStore for MemoryPageStore {
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> Result<()> {
        let page = self
            .pages
            .get(&page_id)
            .ok_or(DatabaseError::PageNotFound { page_id })?;
        if page.len() != buffer.len() {
            return Err(DatabaseError::InvalidPageSize {
                expected: buffer.len(),
                actual: page.len(),
            });
        }
        buffer.copy_from_slice(page);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> Result<()> {
        if page_id == 0 || page_id > self.page_count() + 1 {
            return Err(DatabaseError::PageNotFound { page_id });
        }
        self.pages.insert(page_id, buffer.to_vec());
        Ok(())
    }

    fn page_count(&self) -> u64 {
        self.pages.len() as u64
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Single-file page store: a [`PageFileHeader`] followed by fixed-size page
/// images laid out by page id.
pub struct FilePageStore {
    pub path: PathBuf,
    pub header: PageFileHeader,
    file: File,
}

impl FilePageStore {
    pub fn create<P: AsRef<Path>>(path: P, page_capacity: usize, slot_size: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Creating page file at path: {}", path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(path)?;
        let header = PageFileHeader::new(page_capacity, slot_size);
        file.write_all(&header.to_bytes())?;
        file.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            file,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening page file at path: {}", path.display());
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut header_buffer = vec![0u8; SEQUEL_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_buffer)?;
        let header = PageFileHeader::from_bytes(&header_buffer)?;

        validate_geometry(header.page_capacity as usize, header.slot_size as usize).map_err(
            |err| DatabaseError::CorruptedDatabase {
                reason: format!("page file header carries bad geometry: {err}"),
            },
        )?;

        let image_size = Page::image_size(header.page_capacity as usize) as u64;
        let file_size = file.metadata()?.len();
        let expected_size = header
            .page_count
            .checked_mul(image_size)
            .and_then(|pages| pages.checked_add(SEQUEL_HEADER_SIZE as u64))
            .ok_or_else(|| DatabaseError::CorruptedDatabase {
                reason: format!("page count {} is out of range", header.page_count),
            })?;
        if file_size != expected_size {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!(
                    "File size {} doesn't match header ({} pages, {} bytes expected)",
                    file_size, header.page_count, expected_size
                ),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            file,
        })
    }

    pub fn page_capacity(&self) -> usize {
        self.header.page_capacity as usize
    }

    pub fn slot_size(&self) -> usize {
        self.header.slot_size as usize
    }

    fn image_size(&self) -> usize {
        Page::image_size(self.page_capacity())
    }

    fn page_offset(&self, page_id: PageId) -> u64 {
        SEQUEL_HEADER_SIZE as u64 + (page_id - 1) * self.image_size() as u64
    }

    fn check_buffer(&self, buffer_len: usize) -> Result<()> {
        if buffer_len != self.image_size() {
            return Err(DatabaseError::InvalidPageSize {
                expected: self.image_size(),
                actual: buffer_len,
            });
        }
        Ok(())
    }

    fn update_header_in_file(&mut self) -> Result<()> {
        let header_bytes = self.header.to_bytes();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header_bytes)?;
        Ok(())
    }
}

impl PageStore for FilePageStore {
    fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> Result<()> {
        self.check_buffer(buffer.len())?;
        if page_id == 0 || page_id > self.header.page_count {
            return Err(DatabaseError::PageNotFound { page_id });
        }
        self.file.seek(SeekFrom::Start(self.page_offset(page_id)))?;
        self.file.read_exact(buffer)?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> Result<()> {
        self.check_buffer(buffer.len())?;
        if page_id == 0 || page_id > self.header.page_count + 1 {
            return Err(DatabaseError::PageNotFound { page_id });
        }
        self.file.seek(SeekFrom::Start(self.page_offset(page_id)))?;
        self.file.write_all(buffer)?;

        if page_id == self.header.page_count + 1 {
            self.header.page_count = page_id;
            debug!(page_id, path = %self.path.display(), "extended page file");
        }
        self.header.file_change_counter = self.header.file_change_counter.wrapping_add(1);
        self.update_header_in_file()?;
        self.file.flush()?;
        Ok(())
    }

    fn page_count(&self) -> u64 {
        self.header.page_count
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
