//! Fixed-size content blocks chained by forward references.
//!
//! Blocks live in the blob store under `block.<id>`, where `<id>` is an
//! opaque sequence number. The next free number is persisted under
//! `block.seq` and advanced with a compare-and-swap, so every handle on the
//! same store draws from one sequence.

use alloc::{format, string::String, sync::Arc, vec::Vec};
use core::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::FatConfig,
    error::{FatError, FatResult},
    store::BlobStore,
};

const SEQ_KEY: &str = "block.seq";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(u64);

impl BlockId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    pub fn key(&self) -> String {
        format!("block.{:016x}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// One stored unit of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub payload: String,
    pub next: Option<BlockId>,
    /// Kept alongside `next` so a truncated chain is detectable.
    pub is_last: bool,
}

pub struct BlockStore<S: BlobStore> {
    store: Arc<S>,
    config: FatConfig,
}

impl<S: BlobStore> BlockStore<S> {
    pub fn new(store: Arc<S>, config: FatConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &FatConfig {
        &self.config
    }

    /// Split `content` into blocks and write them. Returns the head, or
    /// `None` for empty content.
    pub fn allocate_chain(&self, content: &str) -> FatResult<Option<BlockId>> {
        let chunks = chunk(content, self.config.block_size);
        if chunks.is_empty() {
            return Ok(None);
        }
        let first = self.reserve(chunks.len() as u64)?;
        let count = chunks.len();

        // tail first: a block is only referenced once it exists
        for (i, payload) in chunks.into_iter().enumerate().rev() {
            let id = BlockId(first + i as u64);
            let is_last = i + 1 == count;
            let block = Block {
                payload,
                next: (!is_last).then(|| BlockId(first + i as u64 + 1)),
                is_last,
            };
            if let Err(e) = self.write_block(id, &block) {
                for j in i + 1..count {
                    let _ = self.store.delete(&BlockId(first + j as u64).key());
                }
                return Err(e);
            }
        }
        debug!(
            "allocated chain {} ({} blocks, {} chars)",
            BlockId(first),
            count,
            content.chars().count()
        );
        Ok(Some(BlockId(first)))
    }

    /// Concatenate the payloads of the chain starting at `head`.
    pub fn read_chain(&self, head: Option<BlockId>) -> FatResult<String> {
        self.read_chain_bounded(head, self.config.max_chain_blocks)
    }

    /// Like [`read_chain`](Self::read_chain), failing with `CorruptChain` if
    /// the chain does not end within `max_blocks` blocks.
    pub fn read_chain_bounded(&self, head: Option<BlockId>, max_blocks: usize) -> FatResult<String> {
        let mut content = String::new();
        self.walk(head, max_blocks, |_, block| content.push_str(&block.payload))?;
        Ok(content)
    }

    /// Identifiers of the chain in traversal order.
    pub fn chain_blocks(&self, head: Option<BlockId>) -> FatResult<Vec<BlockId>> {
        let mut ids = Vec::new();
        self.walk(head, self.config.max_chain_blocks, |id, _| ids.push(id))?;
        Ok(ids)
    }

    /// Delete every block of the chain. Stops quietly at a missing block.
    /// Returns how many blocks were removed.
    pub fn free_chain(&self, head: Option<BlockId>) -> FatResult<usize> {
        self.free_chain_bounded(head, self.config.max_chain_blocks)
    }

    /// Like [`free_chain`](Self::free_chain), deleting at most `max_blocks`
    /// blocks. A chain whose links run past its recorded length must not
    /// take blocks of other chains with it.
    pub fn free_chain_bounded(&self, head: Option<BlockId>, max_blocks: usize) -> FatResult<usize> {
        let mut freed = 0;
        let mut cur = head;
        while let Some(id) = cur {
            if freed >= max_blocks {
                warn!("free of chain {:?} stopped at the hop bound", head);
                break;
            }
            let block = match self.load_block(id)? {
                Some(block) => block,
                None => {
                    warn!("free of chain {:?} stopped at missing block {}", head, id);
                    break;
                }
            };
            self.store.delete(&id.key())?;
            freed += 1;
            cur = if block.is_last { None } else { block.next };
        }
        if freed > 0 {
            debug!("freed {} blocks from chain {:?}", freed, head);
        }
        Ok(freed)
    }

    pub fn load_block(&self, id: BlockId) -> FatResult<Option<Block>> {
        match self.store.get(&id.key())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_block(&self, id: BlockId, block: &Block) -> FatResult<()> {
        let bytes = serde_json::to_vec(block)?;
        self.store.put(&id.key(), &bytes)
    }

    fn walk(
        &self,
        head: Option<BlockId>,
        max_blocks: usize,
        mut visit: impl FnMut(BlockId, &Block),
    ) -> FatResult<()> {
        let mut cur = match head {
            Some(id) => id,
            None => return Ok(()),
        };
        let mut hops = 0;
        loop {
            if hops >= max_blocks {
                return Err(FatError::CorruptChain(cur));
            }
            hops += 1;
            let block = self.load_block(cur)?.ok_or(FatError::CorruptChain(cur))?;
            visit(cur, &block);
            if block.is_last {
                return Ok(());
            }
            cur = block.next.ok_or(FatError::CorruptChain(cur))?;
        }
    }

    /// Reserve `n` consecutive identifiers and return the first.
    fn reserve(&self, n: u64) -> FatResult<u64> {
        loop {
            let current = self.store.get(SEQ_KEY)?;
            let first = match &current {
                Some(bytes) => serde_json::from_slice::<u64>(bytes)?,
                None => 1,
            };
            let next = first
                .checked_add(n)
                .ok_or_else(|| FatError::Io(String::from("block identifiers exhausted")))?;
            let next = serde_json::to_vec(&next)?;
            if self
                .store
                .compare_and_swap(SEQ_KEY, current.as_deref(), &next)?
            {
                return Ok(first);
            }
            debug!("block sequence moved under us, retrying");
        }
    }
}

/// Split by characters into pieces of at most `size`.
fn chunk(content: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut cur = String::new();
    let mut len = 0;
    for c in content.chars() {
        cur.push(c);
        len += 1;
        if len == size {
            chunks.push(core::mem::take(&mut cur));
            len = 0;
        }
    }
    if !cur.is_empty() {
        chunks.push(cur);
    }
    chunks
}
