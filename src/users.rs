//! Identity oracle consumed by the lifecycle manager.

use alloc::{collections::BTreeMap, string::String};

use serde::{Deserialize, Serialize};

pub trait UserDirectory: Send + Sync {
    fn is_admin(&self, user: &str) -> bool;
    fn user_exists(&self, user: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Fixed user table, e.g. loaded from a JSON object `{"name": "admin"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticUsers {
    roles: BTreeMap<String, Role>,
}

impl StaticUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user: &str, role: Role) -> Self {
        self.insert(user, role);
        self
    }

    pub fn insert(&mut self, user: &str, role: Role) {
        self.roles.insert(user.into(), role);
    }

    pub fn role(&self, user: &str) -> Option<Role> {
        self.roles.get(user).copied()
    }
}

impl UserDirectory for StaticUsers {
    fn is_admin(&self, user: &str) -> bool {
        self.role(user) == Some(Role::Admin)
    }

    fn user_exists(&self, user: &str) -> bool {
        self.roles.contains_key(user)
    }
}
