//! File lifecycle manager: the entry point for every caller.
//!
//! Each operation loads a fresh table snapshot, validates existence, trash
//! state, authorization and input before touching anything, then writes
//! blocks and publishes the table with a single atomic save. Writers hold
//! `state_lock` exclusively for the whole load-mutate-save sequence.

use alloc::{string::String, sync::Arc, vec::Vec};

use log::{info, warn};
use spin::RwLock;

use crate::{
    block::{BlockId, BlockStore},
    clock::Clock,
    config::FatConfig,
    error::{FatError, FatResult},
    perm::{authorize, Action},
    store::BlobStore,
    table::{DirEntry, FatTable, Table},
    users::UserDirectory,
};

/// Result of a successful `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFile {
    pub name: String,
    pub entry: DirEntry,
    pub content: String,
}

/// One row of a listing. `readable` is false for rows the actor may see
/// but not open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub name: String,
    pub entry: DirEntry,
    pub readable: bool,
}

/// What `manage_permission` did. All variants are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionChange {
    Granted,
    AlreadyGranted,
    Revoked,
    NotGranted,
}

impl PermissionChange {
    pub fn changed(self) -> bool {
        matches!(self, PermissionChange::Granted | PermissionChange::Revoked)
    }
}

pub struct FatFs<S: BlobStore, U: UserDirectory> {
    blocks: BlockStore<S>,
    table: FatTable<S>,
    users: U,
    clock: Arc<dyn Clock>,
    state_lock: RwLock<()>,
}

impl<S: BlobStore, U: UserDirectory> FatFs<S, U> {
    pub fn new(
        store: Arc<S>,
        users: U,
        clock: Arc<dyn Clock>,
        config: FatConfig,
    ) -> FatResult<Self> {
        config.validate()?;
        let table = FatTable::new(store.clone(), config.block_size);
        // refuse a store cut with another block size before serving anything
        table.load()?;
        Ok(Self {
            blocks: BlockStore::new(store, config),
            table,
            users,
            clock,
            state_lock: RwLock::new(()),
        })
    }

    #[cfg(feature = "std")]
    pub fn with_system_clock(store: Arc<S>, users: U, config: FatConfig) -> FatResult<Self> {
        Self::new(store, users, Arc::new(crate::clock::SystemClock), config)
    }

    pub fn users(&self) -> &U {
        &self.users
    }

    pub fn block_store(&self) -> &BlockStore<S> {
        &self.blocks
    }

    /// Current persisted table, for inspection.
    pub fn snapshot(&self) -> FatResult<Table> {
        let _guard = self.state_lock.read();
        self.table.load()
    }

    pub fn create(&self, name: &str, content: &str, actor: &str) -> FatResult<()> {
        if name.is_empty() || content.is_empty() {
            return Err(FatError::EmptyInput);
        }
        let _guard = self.state_lock.write();
        let mut table = self.table.load()?;
        if table.contains(name) {
            return Err(FatError::NameTaken(name.into()));
        }

        let head = self.blocks.allocate_chain(content)?;
        let size = content.chars().count();
        table.put(name, DirEntry::new(actor, head, size, self.clock.now()));
        self.commit_or_release(&mut table, head)?;
        info!("{} created {} ({} chars)", actor, name, size);
        Ok(())
    }

    pub fn list(&self, include_trashed: bool, actor: &str) -> FatResult<Vec<ListRow>> {
        let is_admin = self.users.is_admin(actor);
        let _guard = self.state_lock.read();
        let table = self.table.load()?;
        Ok(table
            .iter()
            .filter(|(_, entry)| entry.trashed == include_trashed)
            .map(|(name, entry)| ListRow {
                name: name.clone(),
                entry: entry.clone(),
                readable: authorize(entry, actor, Action::Read, is_admin),
            })
            .collect())
    }

    pub fn open(&self, name: &str, actor: &str) -> FatResult<OpenedFile> {
        let is_admin = self.users.is_admin(actor);
        let _guard = self.state_lock.read();
        let table = self.table.load()?;
        let entry = active_entry(&table, name)?;
        if !authorize(entry, actor, Action::Read, is_admin) {
            return Err(FatError::Forbidden);
        }
        let bound = self.blocks.config().blocks_for(entry.size);
        let content = self.blocks.read_chain_bounded(entry.head, bound)?;
        Ok(OpenedFile {
            name: name.into(),
            entry: entry.clone(),
            content,
        })
    }

    pub fn modify(&self, name: &str, new_content: &str, actor: &str) -> FatResult<()> {
        if new_content.is_empty() {
            return Err(FatError::EmptyInput);
        }
        let is_admin = self.users.is_admin(actor);
        let _guard = self.state_lock.write();
        let mut table = self.table.load()?;
        let (old_head, old_blocks) = {
            let entry = active_entry(&table, name)?;
            if !authorize(entry, actor, Action::Write, is_admin) {
                return Err(FatError::Forbidden);
            }
            (entry.head, self.blocks.config().blocks_for(entry.size))
        };

        let head = self.blocks.allocate_chain(new_content)?;
        let size = new_content.chars().count();
        let now = self.clock.now();
        if let Some(entry) = table.get_mut(name) {
            entry.replace_content(head, size, now);
        }
        self.commit_or_release(&mut table, head)?;

        // the new chain is installed; reclaiming the old one is best-effort
        if let Err(e) = self.blocks.free_chain_bounded(old_head, old_blocks) {
            warn!("could not free old chain of {}: {}", name, e);
        }
        info!("{} modified {} ({} chars)", actor, name, size);
        Ok(())
    }

    /// Move `name` to the trash. Its blocks are kept for `recover`.
    pub fn delete(&self, name: &str, actor: &str) -> FatResult<()> {
        let is_admin = self.users.is_admin(actor);
        let _guard = self.state_lock.write();
        let mut table = self.table.load()?;
        let now = self.clock.now();
        let entry = table
            .get_mut(name)
            .ok_or_else(|| FatError::NotFound(name.into()))?;
        if entry.trashed {
            return Err(FatError::AlreadyTrashed(name.into()));
        }
        if !authorize(entry, actor, Action::Manage, is_admin) {
            return Err(FatError::Forbidden);
        }
        entry.move_to_trash(now);
        self.table.save(&mut table)?;
        info!("{} moved {} to the trash", actor, name);
        Ok(())
    }

    pub fn recover(&self, name: &str, actor: &str) -> FatResult<()> {
        let is_admin = self.users.is_admin(actor);
        let _guard = self.state_lock.write();
        let mut table = self.table.load()?;
        let entry = table
            .get_mut(name)
            .ok_or_else(|| FatError::NotFound(name.into()))?;
        if !entry.trashed {
            return Err(FatError::NotTrashed(name.into()));
        }
        if !authorize(entry, actor, Action::Manage, is_admin) {
            return Err(FatError::Forbidden);
        }
        entry.restore();
        self.table.save(&mut table)?;
        info!("{} recovered {}", actor, name);
        Ok(())
    }

    /// Grant or revoke `perm_kind` for `target_user`. Repeating a grant or
    /// revoking an absent permission succeeds without writing anything.
    pub fn manage_permission(
        &self,
        name: &str,
        actor: &str,
        target_user: &str,
        perm_kind: Action,
        grant: bool,
    ) -> FatResult<PermissionChange> {
        let is_admin = self.users.is_admin(actor);
        let _guard = self.state_lock.write();
        let mut table = self.table.load()?;
        let entry = table
            .get_mut(name)
            .ok_or_else(|| FatError::NotFound(name.into()))?;
        if entry.trashed {
            return Err(FatError::InTrash(name.into()));
        }
        if !authorize(entry, actor, Action::Manage, is_admin) {
            return Err(FatError::Forbidden);
        }
        if !self.users.user_exists(target_user) {
            return Err(FatError::UnknownTarget(target_user.into()));
        }
        let bit = perm_kind
            .access()
            .ok_or_else(|| FatError::InvalidPermission(alloc::format!("{}", perm_kind)))?;

        let current = entry.granted(target_user);
        let change = match (grant, current.contains(bit)) {
            (true, true) => PermissionChange::AlreadyGranted,
            (true, false) => PermissionChange::Granted,
            (false, true) => PermissionChange::Revoked,
            (false, false) => PermissionChange::NotGranted,
        };
        if !change.changed() {
            return Ok(change);
        }

        let updated = if grant { current | bit } else { current - bit };
        if updated.is_empty() {
            entry.permissions.remove(target_user);
        } else {
            entry.permissions.insert(target_user.into(), updated);
        }
        self.table.save(&mut table)?;
        info!(
            "{} {:?} {} on {} for {}",
            actor, change, perm_kind, name, target_user
        );
        Ok(change)
    }

    /// Save `table`; if that fails, release the chain allocated for it.
    fn commit_or_release(&self, table: &mut Table, head: Option<BlockId>) -> FatResult<()> {
        if let Err(e) = self.table.save(table) {
            if let Err(free_err) = self.blocks.free_chain(head) {
                warn!("could not release uncommitted chain {:?}: {}", head, free_err);
            }
            return Err(e);
        }
        Ok(())
    }
}

fn active_entry<'a>(table: &'a Table, name: &str) -> FatResult<&'a DirEntry> {
    let entry = table
        .get(name)
        .ok_or_else(|| FatError::NotFound(name.into()))?;
    if entry.trashed {
        return Err(FatError::InTrash(name.into()));
    }
    Ok(entry)
}
