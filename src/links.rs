//! Guarded link operations: create, delete, stats, list, resolve

use crate::constants::{MAX_RANDOM_ATTEMPTS, MAX_URL_LEN};
use crate::entity::{Actor, LinkId, LinkStats, NewLink, ShortLink};
use crate::error::{LinkgateError, Result};
use crate::namespace::{allocate, CustomPath, PathGenerator, RandomPathGenerator};
use crate::policy::{
    can_create_link, can_delete_link, can_list_all_links, can_list_own_links, can_view_stats,
    require, Operation,
};
use crate::store::LinkStore;

/// Link CRUD and stats, each checked against the authorization policy
pub struct LinkAccessGuard<S> {
    store: S,
    paths: Box<dyn PathGenerator>,
}

impl<S: LinkStore> LinkAccessGuard<S> {
    pub fn new(store: S) -> Self {
        Self::with_generator(store, RandomPathGenerator::default())
    }

    pub fn with_generator(store: S, paths: impl PathGenerator + 'static) -> Self {
        LinkAccessGuard { store, paths: Box::new(paths) }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a short link, optionally at a custom path.
    ///
    /// A taken custom path is a `Conflict` for the caller to resolve; it is
    /// never retried or altered here.
    pub fn create_link(
        &self,
        actor: &Actor,
        original_url: &str,
        custom: Option<&CustomPath>,
    ) -> Result<ShortLink> {
        validate_url(original_url)?;
        let requested = match custom {
            Some(c) => allocate(actor, &c.suffix, c.use_global)?,
            None => None,
        };
        let link = match requested {
            Some(path) => self.store.insert_link(NewLink {
                owner_id: actor.id(),
                path,
                original_url: original_url.to_string(),
            })?,
            None => {
                require(can_create_link(actor, None), actor, Operation::CreateLink)?;
                self.insert_random(actor, original_url)?
            }
        };
        tracing::info!(actor = ?actor.id(), link = link.id, path = %link.path, "created link");
        Ok(link)
    }

    fn insert_random(&self, actor: &Actor, original_url: &str) -> Result<ShortLink> {
        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let new = NewLink {
                owner_id: actor.id(),
                path: self.paths.generate()?,
                original_url: original_url.to_string(),
            };
            match self.store.insert_link(new) {
                Err(LinkgateError::Conflict(_)) => continue,
                r => return r,
            }
        }
        Err(LinkgateError::conflict("no free random path"))
    }

    pub fn delete_link(&self, actor: &Actor, id: LinkId) -> Result<()> {
        let link = self.find(id)?;
        require(can_delete_link(actor, &link), actor, Operation::DeleteLink)?;
        if !self.store.delete_link(id)? {
            return Err(LinkgateError::NotFound("link"));
        }
        tracing::info!(actor = ?actor.id(), link = id, "deleted link");
        Ok(())
    }

    pub fn link_stats(&self, actor: &Actor, id: LinkId) -> Result<LinkStats> {
        let link = self.find(id)?;
        require(can_view_stats(actor, &link), actor, Operation::ViewLinkStats)?;
        let owner_name = match link.owner_id {
            Some(owner) => self.store.find_user_by_id(owner)?.map(|u| u.username),
            None => None,
        };
        Ok(LinkStats { total_clicks: link.click_count, owner_name, link })
    }

    /// List the actor's links, or every link when `include_others` is set
    /// and the actor may act on others' links.
    ///
    /// Without that capability the request silently narrows to own links.
    pub fn list_links(&self, actor: &Actor, include_others: bool) -> Result<Vec<ShortLink>> {
        require(can_list_own_links(actor), actor, Operation::ListOwnLinks)?;
        if include_others && can_list_all_links(actor) {
            return self.store.list_all_links();
        }
        match actor.id() {
            Some(id) => self.store.list_links_by_owner(id),
            None => Ok(Vec::new()),
        }
    }

    /// Public redirect lookup; counts the click
    pub fn resolve(&self, path: &str) -> Result<ShortLink> {
        self.store
            .record_click(path.trim_start_matches('/'))?
            .ok_or(LinkgateError::NotFound("link"))
    }

    fn find(&self, id: LinkId) -> Result<ShortLink> {
        self.store.find_link_by_id(id)?.ok_or(LinkgateError::NotFound("link"))
    }
}

/// Only absolute http(s) URLs with a host are shortened
fn validate_url(raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(LinkgateError::invalid("original URL is empty"));
    }
    if raw.len() > MAX_URL_LEN {
        return Err(LinkgateError::invalid(format!("original URL longer than {MAX_URL_LEN} bytes")));
    }
    let url = url::Url::parse(raw).map_err(|e| LinkgateError::invalid(format!("original URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(LinkgateError::invalid("original URL must be http or https"));
    }
    Ok(())
}
