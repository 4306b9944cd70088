#![cfg_attr(not(any(test, feature = "std")), no_std)]
extern crate alloc;

pub mod block;
pub mod clock;
pub mod config;
pub mod error;
pub mod fs;
pub mod perm;
pub mod store;
pub mod table;
pub mod users;

#[cfg(feature = "std")]
pub mod dir_store;

#[cfg(test)]
mod fat_test;

pub use block::{Block, BlockId, BlockStore};
pub use clock::{Clock, FatTimeSpec, StepClock};
#[cfg(feature = "std")]
pub use clock::SystemClock;
pub use config::FatConfig;
#[cfg(feature = "std")]
pub use dir_store::DirBlobStore;
pub use error::{FatError, FatResult};
pub use fs::{FatFs, ListRow, OpenedFile, PermissionChange};
pub use perm::{authorize, Access, Action};
pub use store::{BlobStore, MemBlobStore};
pub use table::{DirEntry, FatTable, Table};
pub use users::{Role, StaticUsers, UserDirectory};

/// Default characters per block.
pub const BLOCK_SIZE: usize = 20;

/// Default bound on blocks visited in one chain traversal.
pub const MAX_CHAIN_BLOCKS: usize = 1 << 16;
