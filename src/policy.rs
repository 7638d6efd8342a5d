//! Authorization policy: one decision function per guarded operation
//!
//! Every function is pure and takes the actor explicitly. "Any" and "own"
//! capabilities are independent ORs: a principal holding `DELETE_ANY` but
//! not `DELETE_OWN` may still delete its own link.

use crate::caps::Capability;
use crate::entity::{Actor, ShortLink};
use crate::error::{LinkgateError, Result};
use crate::namespace::Namespace;

/// Operations the policy decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateLink,
    CreateGlobalLink,
    CreatePersonalLink,
    DeleteLink,
    ViewLinkStats,
    ListOwnLinks,
    ListAllLinks,
    ManageUsers,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreateLink => "create_link",
            Operation::CreateGlobalLink => "create_global_link",
            Operation::CreatePersonalLink => "create_personal_link",
            Operation::DeleteLink => "delete_link",
            Operation::ViewLinkStats => "view_link_stats",
            Operation::ListOwnLinks => "list_own_links",
            Operation::ListAllLinks => "list_all_links",
            Operation::ManageUsers => "manage_users",
        }
    }
}

#[inline]
fn has(actor: &Actor, c: Capability) -> bool {
    actor.permissions().has(c)
}

/// An ownerless link is owned by nobody, and an anonymous actor owns nothing
#[inline]
pub fn owns(actor: &Actor, link: &ShortLink) -> bool {
    matches!((actor.id(), link.owner_id), (Some(a), Some(o)) if a == o)
}

/// `None` namespace means a server-assigned path, open to everyone
pub fn can_create_link(actor: &Actor, namespace: Option<&Namespace>) -> bool {
    match namespace {
        None => true,
        Some(Namespace::Global) => has(actor, Capability::CREATE_ANY),
        Some(Namespace::Personal(owner)) => {
            actor.username() == Some(owner.as_str()) && has(actor, Capability::CREATE_PREFIX)
        }
    }
}

pub fn can_delete_link(actor: &Actor, link: &ShortLink) -> bool {
    (owns(actor, link) && has(actor, Capability::DELETE_OWN)) || has(actor, Capability::DELETE_ANY)
}

pub fn can_view_stats(actor: &Actor, link: &ShortLink) -> bool {
    (owns(actor, link) && has(actor, Capability::VIEW_OWN_STATS))
        || has(actor, Capability::VIEW_ANY_STATS)
}

pub fn can_list_own_links(actor: &Actor) -> bool {
    actor.is_authenticated()
}

/// The "show others" toggle is only for principals that can act on others' links
pub fn can_list_all_links(actor: &Actor) -> bool {
    has(actor, Capability::DELETE_ANY) || has(actor, Capability::VIEW_ANY_STATS)
}

pub fn can_manage_users(actor: &Actor) -> bool {
    has(actor, Capability::USER_MANAGE)
}

/// Turn a decision into `Forbidden`, logging the denial without the capability model
#[inline]
pub fn require(allowed: bool, actor: &Actor, op: Operation) -> Result<()> {
    if allowed {
        tracing::debug!(actor = ?actor.id(), op = op.as_str(), "allowed");
        Ok(())
    } else {
        tracing::warn!(actor = ?actor.id(), op = op.as_str(), "denied");
        Err(LinkgateError::Forbidden)
    }
}
