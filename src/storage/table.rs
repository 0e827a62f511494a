use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    storage::{
        CATALOG_FILE_NAME, PAGE_FILE_NAME,
        catalog::{SystemCatalog, read_catalog_file, write_catalog_file},
        config::TableConfig,
        locator::RecordLocator,
        page_store::{FilePageStore, MemoryPageStore, PageStore},
    },
    types::{
        FIRST_PAGE_ID, PageId, RecordId, SLOT_LENGTH_PREFIX_SIZE, SlotOffset,
        error::{DatabaseError, Result},
        page::Page,
        record::RecordLocation,
    },
};

/// A table of records spread over fixed-size pages.
///
/// The table owns its pages, the [`SystemCatalog`] it was constructed with and
/// the [`RecordLocator`]. Every mutation takes `&mut self`; a failed operation
/// returns before touching pages, catalog or locator.
pub struct Table<S: PageStore = MemoryPageStore> {
    config: TableConfig,
    catalog: SystemCatalog,
    locator: RecordLocator,
    pages: BTreeMap<PageId, Page>,
    store: S,
    catalog_path: Option<PathBuf>,
}

impl Table<MemoryPageStore> {
    /// Creates an empty table backed by memory.
    pub fn new(table_name: &str, config: TableConfig) -> Result<Self> {
        Self::from_parts(
            config,
            SystemCatalog::new(table_name),
            RecordLocator::new(),
            MemoryPageStore::new(),
        )
    }
}

impl Table<FilePageStore> {
    /// Creates a table directory holding a page file and a catalog file.
    pub fn create<P: AsRef<Path>>(dir: P, table_name: &str, config: TableConfig) -> Result<Self> {
        config.validate()?;
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        info!("Creating table '{}' at path: {}", table_name, dir.display());

        let store = FilePageStore::create(
            dir.join(PAGE_FILE_NAME),
            config.page_capacity,
            config.slot_size,
        )?;
        let mut table = Self::from_parts(
            config,
            SystemCatalog::new(table_name),
            RecordLocator::new(),
            store,
        )?;
        table.catalog_path = Some(dir.join(CATALOG_FILE_NAME));
        table.flush()?;
        Ok(table)
    }

    /// Opens a table directory written by [`Table::create`].
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let catalog_path = dir.join(CATALOG_FILE_NAME);
        let (config, catalog, locator) = read_catalog_file(&catalog_path)?;
        let store = FilePageStore::open(dir.join(PAGE_FILE_NAME))?;

        if store.page_capacity() != config.page_capacity || store.slot_size() != config.slot_size {
            return Err(DatabaseError::CorruptedDatabase {
                reason: format!(
                    "page file geometry {}/{} does not match catalog geometry {}/{}",
                    store.page_capacity(),
                    store.slot_size(),
                    config.page_capacity,
                    config.slot_size
                ),
            });
        }

        let mut table = Self::from_parts(config, catalog, locator, store)?;
        table.catalog_path = Some(catalog_path);
        info!(
            "Opened table '{}' with {} records in {} pages",
            table.catalog.table_name(),
            table.record_count(),
            table.page_count()
        );
        Ok(table)
    }
}

impl<S: PageStore> Table<S> {
    /// Assembles a table from an injected catalog and locator, loading every
    /// page the catalog knows about from `store`. The result is verified.
    pub fn from_parts(
        config: TableConfig,
        catalog: SystemCatalog,
        locator: RecordLocator,
        mut store: S,
    ) -> Result<Self> {
        config.validate()?;

        if store.page_count() != catalog.total_pages()
            || catalog.next_page_id() != FIRST_PAGE_ID + catalog.total_pages()
        {
            return Err(DatabaseError::inconsistency(
                None,
                format!(
                    "catalog knows {} pages (next id {}), store holds {}",
                    catalog.total_pages(),
                    catalog.next_page_id(),
                    store.page_count()
                ),
            ));
        }

        let mut pages = BTreeMap::new();
        let mut buffer = vec![0u8; Page::image_size(config.page_capacity)];
        for page_id in FIRST_PAGE_ID..catalog.next_page_id() {
            store.read_page(page_id, &mut buffer)?;
            let page = Page::from_bytes(&buffer, config.page_capacity, config.slot_size)?;
            if page.page_id != page_id {
                return Err(DatabaseError::CorruptedPage {
                    page_id,
                    reason: format!("image carries page id {}", page.page_id),
                });
            }
            pages.insert(page_id, page);
        }

        let table = Self {
            config,
            catalog,
            locator,
            pages,
            store,
            catalog_path: None,
        };
        table.verify()?;
        Ok(table)
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SystemCatalog {
        &self.catalog
    }

    pub fn locator(&self) -> &RecordLocator {
        &self.locator
    }

    pub fn name(&self) -> &str {
        self.catalog.table_name()
    }

    pub fn page(&self, page_id: PageId) -> Option<&Page> {
        self.pages.get(&page_id)
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn record_count(&self) -> usize {
        self.locator.len()
    }

    pub fn set_sync_on_write(&mut self, enabled: bool) {
        self.config.sync_on_write = enabled;
    }

    /// Stores `payload` and returns its new, never-before-used record id.
    ///
    /// With `sync_on_write`, a flush failure after the record is stored is
    /// reported as [`DatabaseError::FlushAfterCommit`] naming the new id.
    pub fn insert(&mut self, payload: &[u8]) -> Result<RecordId> {
        let record_id = self.insert_record(payload)?;
        self.after_mutation(&[record_id])?;
        Ok(record_id)
    }

    /// Inserts payloads in order. Stops at the first failure; records inserted
    /// before it stay in the table and the insert error is returned.
    pub fn insert_batch<I, P>(&mut self, payloads: I) -> Result<Vec<RecordId>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut record_ids = Vec::new();
        for payload in payloads {
            match self.insert_record(payload.as_ref()) {
                Ok(record_id) => record_ids.push(record_id),
                Err(err) => {
                    if let Err(flush_err) = self.after_mutation(&record_ids) {
                        warn!(
                            table = %self.catalog.table_name(),
                            error = %flush_err,
                            "flush after partial batch failed"
                        );
                    }
                    return Err(err);
                }
            }
        }
        self.after_mutation(&record_ids)?;
        Ok(record_ids)
    }

    /// Removes a record. Its slot becomes reusable, its id never comes back.
    pub fn remove(&mut self, record_id: RecordId) -> Result<()> {
        let location = self.locate(record_id)?;
        let page = self.page_for_location_mut(location)?;
        page.remove(location.offset)?;
        let has_free_capacity = page.has_free_capacity();

        self.catalog.set_free_page(location.page_id, has_free_capacity);
        self.locator.remove(record_id);
        debug!(
            record_id,
            page_id = location.page_id,
            offset = location.offset,
            "removed record"
        );

        self.after_mutation(&[record_id])
    }

    /// Overwrites the payload of an existing record in place.
    pub fn update(&mut self, record_id: RecordId, payload: &[u8]) -> Result<()> {
        let location = self.locate(record_id)?;
        self.page_for_location_mut(location)?
            .update(location.offset, payload)?;
        self.after_mutation(&[record_id])
    }

    pub fn locate(&self, record_id: RecordId) -> Result<RecordLocation> {
        self.locator
            .get(record_id)
            .ok_or(DatabaseError::RecordNotFound { record_id })
    }

    pub fn lookup(&self, record_id: RecordId) -> Result<&[u8]> {
        let location = self.locate(record_id)?;
        let page = self.pages.get(&location.page_id).ok_or_else(|| {
            DatabaseError::inconsistency(
                Some(location.page_id),
                format!("record {record_id} points at a missing page"),
            )
        })?;
        page.read_located(location.offset)
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        self.locator.contains(record_id)
    }

    /// Live records in ascending id order.
    pub fn iter(&self) -> TableIter<'_, S> {
        TableIter {
            table: self,
            locations: self.locator.iter().collect::<Vec<_>>().into_iter(),
        }
    }

    /// Copies every live record out of the table, ascending by id.
    pub fn scan(&self) -> Result<Vec<(RecordId, Vec<u8>)>> {
        self.iter()
            .map(|entry| entry.map(|(record_id, payload)| (record_id, payload.to_vec())))
            .collect()
    }

    /// Writes dirty pages to the store, then the catalog file if the table
    /// lives on disk.
    pub fn flush(&mut self) -> Result<()> {
        let mut written = 0;
        for (&page_id, page) in self.pages.iter_mut() {
            if !page.is_dirty {
                continue;
            }
            self.store.write_page(page_id, &page.to_bytes())?;
            page.is_dirty = false;
            written += 1;
        }

        if let Some(path) = &self.catalog_path {
            write_catalog_file(path, &self.config, &self.catalog, &self.locator)?;
        }
        self.store.sync()?;
        debug!(table = %self.catalog.table_name(), pages = written, "flushed table");
        Ok(())
    }

    /// Cross-checks pages, catalog and locator.
    pub fn verify(&self) -> Result<()> {
        let mut live_slots: HashMap<PageId, HashSet<SlotOffset>> = HashMap::new();
        for (&page_id, page) in &self.pages {
            if page.page_id != page_id {
                return Err(self.report(
                    Some(page_id),
                    format!("page keyed as {page_id} carries id {}", page.page_id),
                ));
            }
            live_slots.insert(page_id, page.live_offsets()?.into_iter().collect());

            let listed = self.catalog.is_free_page(page_id);
            if listed != page.has_free_capacity() {
                return Err(self.report(
                    Some(page_id),
                    format!(
                        "free page list membership is {listed} but free capacity is {}",
                        page.has_free_capacity()
                    ),
                ));
            }
        }

        let mut seen = HashSet::new();
        for &page_id in self.catalog.free_pages() {
            if !seen.insert(page_id) {
                return Err(self.report(Some(page_id), "page listed twice in free page list"));
            }
            if !self.pages.contains_key(&page_id) {
                return Err(self.report(Some(page_id), "free page list names an unknown page"));
            }
        }

        if self.catalog.total_pages() != self.pages.len() as u64 {
            return Err(self.report(
                None,
                format!(
                    "catalog counts {} pages, table holds {}",
                    self.catalog.total_pages(),
                    self.pages.len()
                ),
            ));
        }

        if let Some(max_record_id) = self.locator.max_record_id() {
            if max_record_id >= self.catalog.next_record_id() {
                return Err(self.report(
                    None,
                    format!("record {max_record_id} is not below the next record id"),
                ));
            }
        }

        // every located slot is claimed from its page's live set exactly once
        for (record_id, location) in self.locator.iter() {
            let live = live_slots.get_mut(&location.page_id).ok_or_else(|| {
                self.report(
                    Some(location.page_id),
                    format!("record {record_id} points at a missing page"),
                )
            })?;
            if !live.remove(&location.offset) {
                return Err(self.report(
                    Some(location.page_id),
                    format!(
                        "record {record_id} points at slot {} which is dead or shared",
                        location.offset
                    ),
                ));
            }
        }

        if let Some((&page_id, unclaimed)) = live_slots.iter().find(|(_, live)| !live.is_empty()) {
            return Err(self.report(
                Some(page_id),
                format!("{} live slots have no located record", unclaimed.len()),
            ));
        }

        Ok(())
    }

    fn insert_record(&mut self, payload: &[u8]) -> Result<RecordId> {
        let max = self.config.slot_size - SLOT_LENGTH_PREFIX_SIZE;
        if payload.len() > max {
            return Err(DatabaseError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        let record_id = self.catalog.peek_record_id()?;

        let (page_id, offset) = match self.catalog.first_free_page() {
            Some(page_id) => {
                let page = self.pages.get_mut(&page_id).ok_or_else(|| {
                    DatabaseError::inconsistency(
                        Some(page_id),
                        "free page list names an unknown page",
                    )
                })?;
                let offset = page.insert(payload).map_err(|err| match err {
                    DatabaseError::PageFull { page_id } => {
                        warn!(page_id, "page in free page list reported full");
                        DatabaseError::inconsistency(
                            Some(page_id),
                            "page in free page list has no room",
                        )
                    }
                    other => other,
                })?;
                (page_id, offset)
            }
            None => {
                let page_id = self.catalog.next_page_id();
                let mut page =
                    Page::new(page_id, self.config.page_capacity, self.config.slot_size)?;
                let offset = page.insert(payload)?;
                self.catalog.allocate_page_id();
                self.pages.insert(page_id, page);
                (page_id, offset)
            }
        };

        let has_free_capacity = self
            .pages
            .get(&page_id)
            .is_some_and(|page| page.has_free_capacity());
        self.catalog.set_free_page(page_id, has_free_capacity);
        self.catalog.allocate_record_id()?;
        self.locator
            .insert(record_id, RecordLocation::new(page_id, offset));
        debug!(record_id, page_id, offset, "inserted record");

        Ok(record_id)
    }

    fn page_for_location_mut(&mut self, location: RecordLocation) -> Result<&mut Page> {
        self.pages.get_mut(&location.page_id).ok_or_else(|| {
            DatabaseError::inconsistency(
                Some(location.page_id),
                "record points at a missing page",
            )
        })
    }

    fn after_mutation(&mut self, committed: &[RecordId]) -> Result<()> {
        if !self.config.sync_on_write || committed.is_empty() {
            return Ok(());
        }
        self.flush().map_err(|err| {
            warn!(
                table = %self.catalog.table_name(),
                ?committed,
                error = %err,
                "flush after commit failed"
            );
            DatabaseError::FlushAfterCommit {
                committed: committed.to_vec(),
                source: Box::new(err),
            }
        })
    }

    fn report(&self, page_id: Option<PageId>, reason: impl Into<String>) -> DatabaseError {
        let reason = reason.into();
        warn!(table = %self.catalog.table_name(), ?page_id, %reason, "table verification failed");
        DatabaseError::inconsistency(page_id, reason)
    }
}

/// Iterator over `(RecordId, payload)` pairs of a table.
pub struct TableIter<'a, S: PageStore> {
    table: &'a Table<S>,
    locations: std::vec::IntoIter<(RecordId, RecordLocation)>,
}

impl<'a, S: PageStore> Iterator for TableIter<'a, S> {
    type Item = Result<(RecordId, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let (record_id, location) = self.locations.next()?;
        let table: &'a Table<S> = self.table;
        let payload = table
            .pages
            .get(&location.page_id)
            .ok_or_else(|| {
                DatabaseError::inconsistency(
                    Some(location.page_id),
                    format!("record {record_id} points at a missing page"),
                )
            })
            .and_then(|page| page.read_located(location.offset));
        Some(payload.map(|payload| (record_id, payload)))
    }
}

impl<'a, S: PageStore> IntoIterator for &'a Table<S> {
    type Item = Result<(RecordId, &'a [u8])>;
    type IntoIter = TableIter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
