//! Users, principals and short links

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::caps::PermissionSet;

pub type UserId = u64;
pub type LinkId = u64;

/// Milliseconds since the unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// An already-authenticated actor. Immutable for one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub permissions: PermissionSet,
}

/// Whoever is performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Principal(Principal),
}

impl Actor {
    #[inline]
    pub fn id(&self) -> Option<UserId> {
        match self {
            Actor::Anonymous => None,
            Actor::Principal(p) => Some(p.id),
        }
    }

    #[inline]
    pub fn username(&self) -> Option<&str> {
        match self {
            Actor::Anonymous => None,
            Actor::Principal(p) => Some(&p.username),
        }
    }

    /// Anonymous actors hold no capabilities
    #[inline]
    pub fn permissions(&self) -> PermissionSet {
        match self {
            Actor::Anonymous => PermissionSet::NONE,
            Actor::Principal(p) => p.permissions,
        }
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::Principal(_))
    }
}

impl From<Principal> for Actor {
    fn from(p: Principal) -> Self {
        Actor::Principal(p)
    }
}

impl From<Option<Principal>> for Actor {
    fn from(p: Option<Principal>) -> Self {
        p.map_or(Actor::Anonymous, Actor::Principal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub permissions: PermissionSet,
    pub created_at: u64,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            username: self.username.clone(),
            permissions: self.permissions,
        }
    }
}

/// Input to `LinkStore::insert_user`
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    pub id: LinkId,
    /// None for anonymously created links
    pub owner_id: Option<UserId>,
    /// Stored without a leading slash, case-sensitive, unique across namespaces
    pub path: String,
    pub original_url: String,
    pub created_at: u64,
    pub click_count: u64,
}

/// Input to `LinkStore::insert_link`
#[derive(Debug, Clone)]
pub struct NewLink {
    pub owner_id: Option<UserId>,
    pub path: String,
    pub original_url: String,
}

/// What a caller may see about a link's traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub link: ShortLink,
    pub owner_name: Option<String>,
    pub total_clicks: u64,
}
