//! The FAT: file name to directory entry, persisted as one snapshot.

use alloc::{collections::BTreeMap, string::String, sync::Arc};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    block::BlockId,
    clock::FatTimeSpec,
    error::{FatError, FatResult},
    perm::Access,
    store::BlobStore,
    BLOCK_SIZE,
};

const TABLE_KEY: &str = "fat.table";

/// Metadata for one file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub owner: String,
    /// First block of the content chain, `None` for empty content.
    pub head: Option<BlockId>,
    /// Content length in characters.
    pub size: usize,
    pub created_at: FatTimeSpec,
    pub modified_at: FatTimeSpec,
    pub trashed: bool,
    /// Set iff `trashed`.
    pub trashed_at: Option<FatTimeSpec>,
    #[serde(default)]
    pub permissions: BTreeMap<String, Access>,
}

impl DirEntry {
    pub fn new(owner: &str, head: Option<BlockId>, size: usize, now: FatTimeSpec) -> Self {
        Self {
            owner: owner.into(),
            head,
            size,
            created_at: now,
            modified_at: now,
            trashed: false,
            trashed_at: None,
            permissions: BTreeMap::new(),
        }
    }

    /// Grants held by `user`, empty if none.
    pub fn granted(&self, user: &str) -> Access {
        self.permissions.get(user).copied().unwrap_or_default()
    }

    pub fn move_to_trash(&mut self, now: FatTimeSpec) {
        self.trashed = true;
        self.trashed_at = Some(now);
    }

    pub fn restore(&mut self) {
        self.trashed = false;
        self.trashed_at = None;
    }

    pub fn replace_content(&mut self, head: Option<BlockId>, size: usize, now: FatTimeSpec) {
        self.head = head;
        self.size = size;
        self.modified_at = now;
    }
}

/// A loaded snapshot of the FAT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    generation: u64,
    /// Chunk size the chains in this table were cut with.
    #[serde(default = "default_block_size")]
    block_size: usize,
    files: BTreeMap<String, DirEntry>,
}

fn default_block_size() -> usize {
    BLOCK_SIZE
}

impl Table {
    pub fn empty(block_size: usize) -> Self {
        Self {
            generation: 0,
            block_size,
            files: BTreeMap::new(),
        }
    }

    /// Save counter this snapshot was loaded at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.files.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DirEntry> {
        self.files.get_mut(name)
    }

    /// Raw setter. Uniqueness and authorization are the caller's job.
    pub fn put(&mut self, name: &str, entry: DirEntry) {
        self.files.insert(name.into(), entry);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DirEntry)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Deserialize)]
struct Header {
    generation: u64,
}

pub struct FatTable<S: BlobStore> {
    store: Arc<S>,
    block_size: usize,
}

impl<S: BlobStore> FatTable<S> {
    /// A table over `store` for chains cut into `block_size` characters.
    pub fn new(store: Arc<S>, block_size: usize) -> Self {
        Self { store, block_size }
    }

    /// The persisted table, or an empty one on first use.
    ///
    /// Fails with `BlockSizeMismatch` if the store was written with a
    /// different block size.
    pub fn load(&self) -> FatResult<Table> {
        let table = match self.store.get(TABLE_KEY)? {
            Some(bytes) => serde_json::from_slice::<Table>(&bytes)?,
            None => return Ok(Table::empty(self.block_size)),
        };
        if table.block_size != self.block_size {
            return Err(FatError::BlockSizeMismatch {
                stored: table.block_size,
                configured: self.block_size,
            });
        }
        Ok(table)
    }

    /// Replace the persisted table with `table`.
    ///
    /// Fails with `Conflict` if another writer saved since `table` was
    /// loaded, including one that slips in between the check and the write.
    /// On success `table` carries the new generation.
    pub fn save(&self, table: &mut Table) -> FatResult<()> {
        let current = self.store.get(TABLE_KEY)?;
        let found = generation_of(current.as_deref())?;
        if found != table.generation {
            return Err(FatError::Conflict {
                expected: table.generation,
                found,
            });
        }
        table.generation += 1;
        let swapped = serde_json::to_vec(table)
            .map_err(FatError::from)
            .and_then(|bytes| {
                self.store
                    .compare_and_swap(TABLE_KEY, current.as_deref(), &bytes)
            });
        match swapped {
            Ok(true) => {}
            Ok(false) => {
                table.generation -= 1;
                let found = generation_of(self.store.get(TABLE_KEY)?.as_deref())?;
                return Err(FatError::Conflict {
                    expected: table.generation,
                    found,
                });
            }
            Err(e) => {
                table.generation -= 1;
                return Err(e);
            }
        }
        debug!("table saved at generation {} ({} entries)", table.generation, table.len());
        Ok(())
    }
}

fn generation_of(bytes: Option<&[u8]>) -> FatResult<u64> {
    match bytes {
        Some(bytes) => Ok(serde_json::from_slice::<Header>(bytes)?.generation),
        None => Ok(0),
    }
}
