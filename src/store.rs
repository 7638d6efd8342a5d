//! Storage collaborator interface and an in-memory implementation

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::caps::{Capability, PermissionSet};
use crate::entity::{now_millis, LinkId, NewLink, NewUser, ShortLink, User, UserId};
use crate::error::{LinkgateError, Result};

/// Persistent storage for users and links.
///
/// `insert_link` must be an atomic insert-if-absent on `path`: of two
/// concurrent inserts for one path exactly one succeeds and the other
/// returns `LinkgateError::Conflict`.
pub trait LinkStore: Send + Sync {
    fn find_link_by_id(&self, id: LinkId) -> Result<Option<ShortLink>>;
    fn find_link_by_path(&self, path: &str) -> Result<Option<ShortLink>>;
    fn insert_link(&self, link: NewLink) -> Result<ShortLink>;
    fn delete_link(&self, id: LinkId) -> Result<bool>;
    fn list_links_by_owner(&self, owner: UserId) -> Result<Vec<ShortLink>>;
    fn list_all_links(&self) -> Result<Vec<ShortLink>>;
    /// Click ingestion: bump `click_count` for the link at `path`
    fn record_click(&self, path: &str) -> Result<Option<ShortLink>>;

    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>>;
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Insert a user; `Conflict` if the username is taken
    fn insert_user(&self, user: NewUser) -> Result<User>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn update_user_permissions(&self, id: UserId, permissions: PermissionSet) -> Result<bool>;
    /// Atomic read-modify-write of a user's mask; `None` if the user is absent
    fn modify_user_permissions(
        &self,
        id: UserId,
        f: &dyn Fn(PermissionSet) -> PermissionSet,
    ) -> Result<Option<PermissionSet>>;
    /// Insert `user` unless some user already holds `USER_MANAGE` (`Conflict`).
    /// The check and the insert are one atomic step.
    fn insert_first_admin(&self, user: NewUser) -> Result<User>;
    fn delete_user(&self, id: UserId) -> Result<bool>;
}

impl<S: LinkStore + ?Sized> LinkStore for Arc<S> {
    fn find_link_by_id(&self, id: LinkId) -> Result<Option<ShortLink>> {
        (**self).find_link_by_id(id)
    }
    fn find_link_by_path(&self, path: &str) -> Result<Option<ShortLink>> {
        (**self).find_link_by_path(path)
    }
    fn insert_link(&self, link: NewLink) -> Result<ShortLink> {
        (**self).insert_link(link)
    }
    fn delete_link(&self, id: LinkId) -> Result<bool> {
        (**self).delete_link(id)
    }
    fn list_links_by_owner(&self, owner: UserId) -> Result<Vec<ShortLink>> {
        (**self).list_links_by_owner(owner)
    }
    fn list_all_links(&self) -> Result<Vec<ShortLink>> {
        (**self).list_all_links()
    }
    fn record_click(&self, path: &str) -> Result<Option<ShortLink>> {
        (**self).record_click(path)
    }
    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        (**self).find_user_by_id(id)
    }
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        (**self).find_user_by_username(username)
    }
    fn insert_user(&self, user: NewUser) -> Result<User> {
        (**self).insert_user(user)
    }
    fn list_users(&self) -> Result<Vec<User>> {
        (**self).list_users()
    }
    fn update_user_permissions(&self, id: UserId, permissions: PermissionSet) -> Result<bool> {
        (**self).update_user_permissions(id, permissions)
    }
    fn modify_user_permissions(
        &self,
        id: UserId,
        f: &dyn Fn(PermissionSet) -> PermissionSet,
    ) -> Result<Option<PermissionSet>> {
        (**self).modify_user_permissions(id, f)
    }
    fn insert_first_admin(&self, user: NewUser) -> Result<User> {
        (**self).insert_first_admin(user)
    }
    fn delete_user(&self, id: UserId) -> Result<bool> {
        (**self).delete_user(id)
    }
}

#[derive(Default)]
struct MemState {
    links: BTreeMap<LinkId, ShortLink>,
    paths: BTreeMap<String, LinkId>,
    users: BTreeMap<UserId, User>,
    usernames: BTreeMap<String, UserId>,
    next_link: LinkId,
    next_user: UserId,
}

/// Process-local store behind a single mutex
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl LinkStore for MemoryStore {
    fn find_link_by_id(&self, id: LinkId) -> Result<Option<ShortLink>> {
        Ok(self.lock().links.get(&id).cloned())
    }

    fn find_link_by_path(&self, path: &str) -> Result<Option<ShortLink>> {
        let s = self.lock();
        Ok(s.paths.get(path).and_then(|id| s.links.get(id)).cloned())
    }

    fn insert_link(&self, link: NewLink) -> Result<ShortLink> {
        let mut s = self.lock();
        if s.paths.contains_key(&link.path) {
            return Err(LinkgateError::conflict(format!("path '{}' is taken", link.path)));
        }
        s.next_link += 1;
        let stored = ShortLink {
            id: s.next_link,
            owner_id: link.owner_id,
            path: link.path,
            original_url: link.original_url,
            created_at: now_millis(),
            click_count: 0,
        };
        s.paths.insert(stored.path.clone(), stored.id);
        s.links.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn delete_link(&self, id: LinkId) -> Result<bool> {
        let mut s = self.lock();
        match s.links.remove(&id) {
            Some(link) => {
                s.paths.remove(&link.path);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_links_by_owner(&self, owner: UserId) -> Result<Vec<ShortLink>> {
        Ok(self
            .lock()
            .links
            .values()
            .filter(|l| l.owner_id == Some(owner))
            .cloned()
            .collect())
    }

    fn list_all_links(&self) -> Result<Vec<ShortLink>> {
        Ok(self.lock().links.values().cloned().collect())
    }

    fn record_click(&self, path: &str) -> Result<Option<ShortLink>> {
        let mut s = self.lock();
        let Some(id) = s.paths.get(path).copied() else {
            return Ok(None);
        };
        Ok(s.links.get_mut(&id).map(|l| {
            l.click_count += 1;
            l.clone()
        }))
    }

    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let s = self.lock();
        Ok(s.usernames.get(username).and_then(|id| s.users.get(id)).cloned())
    }

    fn insert_user(&self, user: NewUser) -> Result<User> {
        self.lock().insert_user(user)
    }

    fn insert_first_admin(&self, user: NewUser) -> Result<User> {
        let mut s = self.lock();
        if s.users.values().any(|u| u.permissions.has(Capability::USER_MANAGE)) {
            return Err(LinkgateError::conflict("already bootstrapped"));
        }
        s.insert_user(user)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.lock().users.values().cloned().collect())
    }

    fn update_user_permissions(&self, id: UserId, permissions: PermissionSet) -> Result<bool> {
        Ok(self.modify_user_permissions(id, &|_| permissions)?.is_some())
    }

    fn modify_user_permissions(
        &self,
        id: UserId,
        f: &dyn Fn(PermissionSet) -> PermissionSet,
    ) -> Result<Option<PermissionSet>> {
        Ok(self.lock().users.get_mut(&id).map(|u| {
            u.permissions = f(u.permissions);
            u.permissions
        }))
    }

    fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut s = self.lock();
        match s.users.remove(&id) {
            Some(user) => {
                s.usernames.remove(&user.username);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl MemState {
    fn insert_user(&mut self, user: NewUser) -> Result<User> {
        if self.usernames.contains_key(&user.username) {
            return Err(LinkgateError::conflict(format!("username '{}' is taken", user.username)));
        }
        self.next_user += 1;
        let stored = User {
            id: self.next_user,
            username: user.username,
            permissions: user.permissions,
            created_at: now_millis(),
        };
        self.usernames.insert(stored.username.clone(), stored.id);
        self.users.insert(stored.id, stored.clone());
        Ok(stored)
    }
}
