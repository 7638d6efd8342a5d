//! LMDB-backed store: database handles and transaction helpers

use std::path::Path;

use byteorder::BigEndian;
use heed::types::{Bytes, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn};

use crate::caps::PermissionSet;
use crate::entity::{LinkId, NewLink, NewUser, ShortLink, User, UserId};
use crate::error::{err, Result};
use crate::read;
use crate::store::LinkStore;
use crate::tx::Tx;

// Database type aliases
pub type Db = Database<Bytes, U64<BigEndian>>;
pub type DbRecords = Database<U64<BigEndian>, Bytes>;
pub type DbIds = Database<Str, U64<BigEndian>>;

pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Create a 16-byte key from two u64 values
#[inline]
pub fn key(a: u64, b: u64) -> [u8; 16] {
    let mut k = [0u8; 16];
    k[..8].copy_from_slice(&a.to_be_bytes());
    k[8..].copy_from_slice(&b.to_be_bytes());
    k
}

/// All database handles
pub struct Dbs {
    /// link id -> JSON ShortLink
    pub links: DbRecords,
    /// path -> link id (the uniqueness index)
    pub paths: DbIds,
    /// [owner, link] -> created_at
    pub owners: Db,
    /// user id -> JSON User
    pub users: DbRecords,
    /// username -> user id
    pub usernames: DbIds,
    /// id counters
    pub meta: DbIds,
}

/// Users and links persisted in one LMDB environment.
///
/// Every write runs in a single LMDB write transaction; LMDB admits one
/// writer at a time, which makes the path check and insert atomic.
pub struct LmdbStore {
    env: Env,
    dbs: Dbs,
}

impl LmdbStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with(path: impl AsRef<Path>, map_size: usize) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(6)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            links: env.create_database(&mut tx, Some("links")).map_err(err)?,
            paths: env.create_database(&mut tx, Some("paths")).map_err(err)?,
            owners: env.create_database(&mut tx, Some("owners")).map_err(err)?,
            users: env.create_database(&mut tx, Some("users")).map_err(err)?,
            usernames: env.create_database(&mut tx, Some("usernames")).map_err(err)?,
            meta: env.create_database(&mut tx, Some("meta")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        tracing::debug!(path = %path.display(), map_size, "opened link store");
        Ok(LmdbStore { env, dbs })
    }

    /// Execute a read-only operation
    #[inline]
    pub(crate) fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.env.read_txn().map_err(err)?;
        f(&self.dbs, &tx)
    }

    /// Run multiple writes in a single transaction
    #[inline]
    pub(crate) fn transact<T, F: FnOnce(&mut Tx) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = Tx::new(&self.env, &self.dbs)?;
        let r = f(&mut tx)?;
        tx.commit()?;
        Ok(r)
    }

    /// Clear all databases (for testing)
    pub fn clear_all(&self) -> Result<()> {
        self.transact(|tx| tx.clear())
    }
}

impl LinkStore for LmdbStore {
    fn find_link_by_id(&self, id: LinkId) -> Result<Option<ShortLink>> {
        self.read(|d, tx| read::get_link(d, tx, id))
    }

    fn find_link_by_path(&self, path: &str) -> Result<Option<ShortLink>> {
        self.read(|d, tx| match read::link_id_by_path(d, tx, path)? {
            Some(id) => read::get_link(d, tx, id),
            None => Ok(None),
        })
    }

    fn insert_link(&self, link: NewLink) -> Result<ShortLink> {
        self.transact(|tx| tx.insert_link(link))
    }

    fn delete_link(&self, id: LinkId) -> Result<bool> {
        self.transact(|tx| tx.delete_link(id))
    }

    fn list_links_by_owner(&self, owner: UserId) -> Result<Vec<ShortLink>> {
        self.read(|d, tx| read::links_for_owner(d, tx, owner))
    }

    fn list_all_links(&self) -> Result<Vec<ShortLink>> {
        self.read(read::all_links)
    }

    fn record_click(&self, path: &str) -> Result<Option<ShortLink>> {
        self.transact(|tx| tx.record_click(path))
    }

    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.read(|d, tx| read::get_user(d, tx, id))
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.read(|d, tx| match read::user_id_by_name(d, tx, username)? {
            Some(id) => read::get_user(d, tx, id),
            None => Ok(None),
        })
    }

    fn insert_user(&self, user: NewUser) -> Result<User> {
        self.transact(|tx| tx.insert_user(user))
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.read(read::all_users)
    }

    fn update_user_permissions(&self, id: UserId, permissions: PermissionSet) -> Result<bool> {
        self.transact(|tx| tx.set_permissions(id, permissions))
    }

    fn modify_user_permissions(
        &self,
        id: UserId,
        f: &dyn Fn(PermissionSet) -> PermissionSet,
    ) -> Result<Option<PermissionSet>> {
        self.transact(|tx| tx.modify_permissions(id, f))
    }

    fn insert_first_admin(&self, user: NewUser) -> Result<User> {
        self.transact(|tx| tx.insert_first_admin(user))
    }

    fn delete_user(&self, id: UserId) -> Result<bool> {
        self.transact(|tx| tx.delete_user(id))
    }
}
