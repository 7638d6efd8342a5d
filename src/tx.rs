//! Write transaction wrapper

use heed::{Env, RwTxn};
use serde::Serialize;

use crate::caps::{Capability, PermissionSet};
use crate::db::{key, Dbs};
use crate::entity::{now_millis, LinkId, NewLink, NewUser, ShortLink, User, UserId};
use crate::error::{err, LinkgateError, Result};
use crate::read;

const NEXT_LINK_ID: &str = "next_link_id";
const NEXT_USER_ID: &str = "next_user_id";

/// A single LMDB write transaction over the link store
pub struct Tx<'e> {
    txn: RwTxn<'e>,
    dbs: &'e Dbs,
}

fn encode<T: Serialize>(v: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(v).map_err(err)
}

impl<'e> Tx<'e> {
    #[inline]
    pub(crate) fn new(env: &'e Env, dbs: &'e Dbs) -> Result<Self> {
        Ok(Tx { txn: env.write_txn().map_err(err)?, dbs })
    }

    #[inline]
    pub(crate) fn commit(self) -> Result<()> {
        self.txn.commit().map_err(err)
    }

    /// Insert a link unless its path is taken (in either namespace)
    pub fn insert_link(&mut self, link: NewLink) -> Result<ShortLink> {
        if self.dbs.paths.get(&self.txn, &link.path).map_err(err)?.is_some() {
            return Err(LinkgateError::conflict(format!("path '{}' is taken", link.path)));
        }
        let id = self.next_id(NEXT_LINK_ID)?;
        let stored = ShortLink {
            id,
            owner_id: link.owner_id,
            path: link.path,
            original_url: link.original_url,
            created_at: now_millis(),
            click_count: 0,
        };
        self.put_link(&stored)?;
        self.dbs.paths.put(&mut self.txn, &stored.path, &id).map_err(err)?;
        if let Some(owner) = stored.owner_id {
            self.dbs.owners.put(&mut self.txn, &key(owner, id), &stored.created_at).map_err(err)?;
        }
        Ok(stored)
    }

    /// Delete a link and its path and owner index entries
    pub fn delete_link(&mut self, id: LinkId) -> Result<bool> {
        let Some(link) = read::get_link(self.dbs, &self.txn, id)? else {
            return Ok(false);
        };
        self.dbs.links.delete(&mut self.txn, &id).map_err(err)?;
        self.dbs.paths.delete(&mut self.txn, &link.path).map_err(err)?;
        if let Some(owner) = link.owner_id {
            self.dbs.owners.delete(&mut self.txn, &key(owner, id)).map_err(err)?;
        }
        Ok(true)
    }

    pub fn record_click(&mut self, path: &str) -> Result<Option<ShortLink>> {
        let Some(id) = read::link_id_by_path(self.dbs, &self.txn, path)? else {
            return Ok(None);
        };
        let Some(mut link) = read::get_link(self.dbs, &self.txn, id)? else {
            return Ok(None);
        };
        link.click_count += 1;
        self.put_link(&link)?;
        Ok(Some(link))
    }

    /// Insert a user unless the username is taken
    pub fn insert_user(&mut self, user: NewUser) -> Result<User> {
        if self.dbs.usernames.get(&self.txn, &user.username).map_err(err)?.is_some() {
            return Err(LinkgateError::conflict(format!("username '{}' is taken", user.username)));
        }
        let id = self.next_id(NEXT_USER_ID)?;
        let stored = User {
            id,
            username: user.username,
            permissions: user.permissions,
            created_at: now_millis(),
        };
        self.put_user(&stored)?;
        self.dbs.usernames.put(&mut self.txn, &stored.username, &id).map_err(err)?;
        Ok(stored)
    }

    /// Replace a user's permission mask exactly (unknown bits included)
    pub fn set_permissions(&mut self, id: UserId, permissions: PermissionSet) -> Result<bool> {
        Ok(self.modify_permissions(id, &|_| permissions)?.is_some())
    }

    /// Rewrite a user's mask from its current value inside this transaction
    pub fn modify_permissions(
        &mut self,
        id: UserId,
        f: &dyn Fn(PermissionSet) -> PermissionSet,
    ) -> Result<Option<PermissionSet>> {
        let Some(mut user) = read::get_user(self.dbs, &self.txn, id)? else {
            return Ok(None);
        };
        user.permissions = f(user.permissions);
        self.put_user(&user)?;
        Ok(Some(user.permissions))
    }

    /// Insert `user` only while nobody holds `USER_MANAGE`
    pub fn insert_first_admin(&mut self, user: NewUser) -> Result<User> {
        let managed = read::all_users(self.dbs, &self.txn)?
            .iter()
            .any(|u| u.permissions.has(Capability::USER_MANAGE));
        if managed {
            return Err(LinkgateError::conflict("already bootstrapped"));
        }
        self.insert_user(user)
    }

    /// Delete a user. Their links stay in place.
    pub fn delete_user(&mut self, id: UserId) -> Result<bool> {
        let Some(user) = read::get_user(self.dbs, &self.txn, id)? else {
            return Ok(false);
        };
        self.dbs.users.delete(&mut self.txn, &id).map_err(err)?;
        self.dbs.usernames.delete(&mut self.txn, &user.username).map_err(err)?;
        Ok(true)
    }

    pub(crate) fn clear(&mut self) -> Result<()> {
        self.dbs.links.clear(&mut self.txn).map_err(err)?;
        self.dbs.paths.clear(&mut self.txn).map_err(err)?;
        self.dbs.owners.clear(&mut self.txn).map_err(err)?;
        self.dbs.users.clear(&mut self.txn).map_err(err)?;
        self.dbs.usernames.clear(&mut self.txn).map_err(err)?;
        self.dbs.meta.clear(&mut self.txn).map_err(err)
    }

    fn put_link(&mut self, link: &ShortLink) -> Result<()> {
        let bytes = encode(link)?;
        self.dbs.links.put(&mut self.txn, &link.id, bytes.as_slice()).map_err(err)
    }

    fn put_user(&mut self, user: &User) -> Result<()> {
        let bytes = encode(user)?;
        self.dbs.users.put(&mut self.txn, &user.id, bytes.as_slice()).map_err(err)
    }

    fn next_id(&mut self, counter: &str) -> Result<u64> {
        let id = self.dbs.meta.get(&self.txn, counter).map_err(err)?.unwrap_or(0) + 1;
        self.dbs.meta.put(&mut self.txn, counter, &id).map_err(err)?;
        Ok(id)
    }
}
