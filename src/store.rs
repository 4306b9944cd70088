//! Key-value blob storage consumed by the block store and the FAT table.

use alloc::{collections::BTreeMap, string::String, vec::Vec};

use spin::Mutex;

use crate::error::FatResult;

/// Persistence medium for blocks and table snapshots.
///
/// `put` must replace the value under `key` atomically: a reader sees either
/// the old bytes or the new bytes, never a mix of both.
pub trait BlobStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> FatResult<()>;
    fn get(&self, key: &str) -> FatResult<Option<Vec<u8>>>;
    /// Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> FatResult<()>;

    /// Store `bytes` under `key` only if the current value equals `expected`
    /// (`None` meaning absent). Returns whether the swap happened.
    ///
    /// Must be atomic against every other `compare_and_swap` on the same
    /// key, including ones issued by other processes sharing the store.
    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, bytes: &[u8]) -> FatResult<bool>;
}

impl<S: BlobStore + ?Sized> BlobStore for alloc::sync::Arc<S> {
    fn put(&self, key: &str, bytes: &[u8]) -> FatResult<()> {
        (**self).put(key, bytes)
    }
    fn get(&self, key: &str) -> FatResult<Option<Vec<u8>>> {
        (**self).get(key)
    }
    fn delete(&self, key: &str) -> FatResult<()> {
        (**self).delete(key)
    }
    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, bytes: &[u8]) -> FatResult<bool> {
        (**self).compare_and_swap(key, expected, bytes)
    }
}

/// In-memory store, used for tests and embedding.
#[derive(Default)]
pub struct MemBlobStore {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.data.lock().keys().cloned().collect()
    }
}

impl BlobStore for MemBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> FatResult<()> {
        self.data.lock().insert(key.into(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> FatResult<Option<Vec<u8>>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> FatResult<()> {
        self.data.lock().remove(key);
        Ok(())
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, bytes: &[u8]) -> FatResult<bool> {
        let mut data = self.data.lock();
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(key.into(), bytes.to_vec());
        Ok(true)
    }
}
