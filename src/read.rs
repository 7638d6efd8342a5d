//! Read operations (no permission checks, direct LMDB access)

use byteorder::{BigEndian, ByteOrder};
use heed::RoTxn;
use serde::de::DeserializeOwned;

use crate::db::Dbs;
use crate::entity::{LinkId, ShortLink, User, UserId};
use crate::error::{err, Result};

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(err)
}

pub(crate) fn get_link(d: &Dbs, tx: &RoTxn, id: LinkId) -> Result<Option<ShortLink>> {
    d.links.get(tx, &id).map_err(err)?.map(decode).transpose()
}

pub(crate) fn link_id_by_path(d: &Dbs, tx: &RoTxn, path: &str) -> Result<Option<LinkId>> {
    d.paths.get(tx, path).map_err(err)
}

/// Links owned by `owner`, via the [owner, link] index
pub(crate) fn links_for_owner(d: &Dbs, tx: &RoTxn, owner: UserId) -> Result<Vec<ShortLink>> {
    let mut ids = Vec::new();
    for item in d.owners.prefix_iter(tx, &owner.to_be_bytes()).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        if k.len() == 16 {
            ids.push(BigEndian::read_u64(&k[8..16]));
        }
    }
    let mut r = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(link) = get_link(d, tx, id)? {
            r.push(link);
        }
    }
    Ok(r)
}

pub(crate) fn all_links(d: &Dbs, tx: &RoTxn) -> Result<Vec<ShortLink>> {
    let mut r = Vec::new();
    for item in d.links.iter(tx).map_err(err)? {
        let (_, v) = item.map_err(err)?;
        r.push(decode(v)?);
    }
    Ok(r)
}

pub(crate) fn get_user(d: &Dbs, tx: &RoTxn, id: UserId) -> Result<Option<User>> {
    d.users.get(tx, &id).map_err(err)?.map(decode).transpose()
}

pub(crate) fn user_id_by_name(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<UserId>> {
    d.usernames.get(tx, name).map_err(err)
}

pub(crate) fn all_users(d: &Dbs, tx: &RoTxn) -> Result<Vec<User>> {
    let mut r = Vec::new();
    for item in d.users.iter(tx).map_err(err)? {
        let (_, v) = item.map_err(err)?;
        r.push(decode(v)?);
    }
    Ok(r)
}
