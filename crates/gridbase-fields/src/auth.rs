//! Group membership checks.
//!
//! Every field operation starts by verifying that the acting [`User`] belongs
//! to the group owning the table. How memberships are stored is up to the
//! application; the engine only asks a [`GroupMembership`] implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use gridbase_core::{GridbaseError, GridbaseResult};
use serde::{Deserialize, Serialize};

/// The actor on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// The user id.
    pub id: i64,
    /// The username, used in log output.
    pub username: String,
}

impl User {
    /// Creates a user.
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// Answers whether a user belongs to a group.
pub trait GroupMembership: Send + Sync {
    /// Returns `true` if `user` is a member of `group_id`.
    fn has_user(&self, group_id: i64, user: &User) -> bool;
}

/// Fails with [`GridbaseError::UserNotInGroup`] unless `user` is a member of
/// `group_id`.
pub fn check_group(
    membership: &dyn GroupMembership,
    group_id: i64,
    user: &User,
) -> GridbaseResult<()> {
    if membership.has_user(group_id, user) {
        Ok(())
    } else {
        tracing::warn!(user_id = user.id, group_id, "user is not a member of the group");
        Err(GridbaseError::UserNotInGroup {
            user_id: user.id,
            group_id,
        })
    }
}

/// An in-memory membership table.
#[derive(Debug, Default)]
pub struct StaticGroups {
    groups: RwLock<HashMap<i64, HashSet<i64>>>,
}

impl StaticGroups {
    /// Creates an empty membership table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `user` to `group_id`.
    pub fn add_user(&self, group_id: i64, user: &User) {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(group_id)
            .or_default()
            .insert(user.id);
    }

    /// Removes `user` from `group_id`.
    pub fn remove_user(&self, group_id: i64, user: &User) {
        if let Some(members) = self
            .groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&group_id)
        {
            members.remove(&user.id);
        }
    }
}

impl GroupMembership for StaticGroups {
    fn has_user(&self, group_id: i64, user: &User) -> bool {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&group_id)
            .is_some_and(|members| members.contains(&user.id))
    }
}
