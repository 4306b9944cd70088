//! Owner/ACL permission model.

use alloc::string::ToString;
use core::{fmt, str::FromStr};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{error::FatError, table::DirEntry};

bitflags! {
    /// Actions a non-owner may be granted on one entry.
    #[derive(Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Access: u8 {
        const READ = 0b01;
        const WRITE = 0b10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    /// Permission changes, delete and recover. Never delegable.
    Manage,
}

impl Action {
    /// The grant bit this action maps to, if it is delegable.
    pub fn access(self) -> Option<Access> {
        match self {
            Action::Read => Some(Access::READ),
            Action::Write => Some(Access::WRITE),
            Action::Manage => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Manage => "manage",
        };
        f.write_str(s)
    }
}

impl FromStr for Action {
    type Err = FatError;

    /// Accepts the English names and their Spanish forms (`lectura`,
    /// `escritura`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "lectura" => Ok(Action::Read),
            "write" | "escritura" => Ok(Action::Write),
            "manage" => Ok(Action::Manage),
            _ => Err(FatError::InvalidPermission(s.to_string())),
        }
    }
}

/// Decide whether `actor` may perform `action` on `entry`.
///
/// Admins and the owner may do anything. Anyone else needs an explicit
/// read or write grant, and `Manage` is never granted.
pub fn authorize(entry: &DirEntry, actor: &str, action: Action, is_actor_admin: bool) -> bool {
    if is_actor_admin || entry.owner == actor {
        return true;
    }
    match action.access() {
        Some(bit) => entry
            .permissions
            .get(actor)
            .map_or(false, |granted| granted.contains(bit)),
        None => false,
    }
}
