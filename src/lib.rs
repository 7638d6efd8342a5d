//! Linkgate - authorization core for a multi-tenant link shortener
//!
//! Principals carry a bitmask of capabilities. The policy decides what each
//! actor may do with a short link or a user; the guards apply those
//! decisions in front of a [`LinkStore`]. Custom paths live either in the
//! global namespace or under `@{username}/`.

pub mod bootstrap;
pub mod caps;
pub mod config;
pub mod constants;
pub mod db;
pub mod entity;
pub mod error;
pub mod links;
pub mod namespace;
pub mod policy;
mod read;
pub mod store;
pub mod tx;
pub mod users;

#[cfg(feature = "server")]
pub mod server;

pub use bootstrap::{bootstrap, is_bootstrapped};
pub use caps::{Capability, PermissionSet};
pub use config::Config;
pub use constants::{
    caps_to_names, names_to_caps, role_by_name, role_name, DEFAULT_ROLE, ROLE_ADMIN, ROLE_EDITOR,
    ROLE_GUEST, ROLE_PRIVILEGED, ROLE_REGULAR,
};
pub use db::LmdbStore;
pub use entity::{Actor, LinkId, LinkStats, NewLink, NewUser, Principal, ShortLink, User, UserId};
pub use error::{LinkgateError, Result};
pub use links::LinkAccessGuard;
pub use namespace::{allocate, CustomPath, Namespace, PathGenerator, RandomPathGenerator};
pub use policy::Operation;
pub use store::{LinkStore, MemoryStore};
pub use users::UserAdministrationGuard;
