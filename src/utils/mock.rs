use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{
    storage::{config::TableConfig, page_store::FilePageStore, table::Table},
    types::error::Result,
};

/// Table directory under a temporary directory that is removed on drop.
pub struct TempTable {
    dir: TempDir,
    pub path: PathBuf,
}

impl TempTable {
    pub fn new() -> Result<Self> {
        Self::with_prefix("sequel_test")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let path = dir.path().join("table");
        Ok(Self { dir, path })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn create(&self, table_name: &str, config: TableConfig) -> Result<Table<FilePageStore>> {
        Table::create(&self.path, table_name, config)
    }

    pub fn open(&self) -> Result<Table<FilePageStore>> {
        Table::open(&self.path)
    }
}

/// Deterministic payload of `len` bytes derived from `seed`.
pub fn sample_payload(seed: u32, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (seed as usize).wrapping_mul(31).wrapping_add(i) as u8)
        .collect()
}
