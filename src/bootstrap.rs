//! Bootstrap and system initialization

use crate::caps::Capability;
use crate::constants::ROLE_ADMIN;
use crate::entity::{NewUser, User};
use crate::error::Result;
use crate::store::LinkStore;
use crate::users::validate_username;

/// Bootstrapped once any user can manage users
pub fn is_bootstrapped<S: LinkStore + ?Sized>(store: &S) -> Result<bool> {
    Ok(store
        .list_users()?
        .iter()
        .any(|u| u.permissions.has(Capability::USER_MANAGE)))
}

/// Create the first administrator. Fails with `Conflict` if already bootstrapped.
pub fn bootstrap<S: LinkStore + ?Sized>(store: &S, username: &str) -> Result<User> {
    validate_username(username)?;
    let admin = store.insert_first_admin(NewUser {
        username: username.to_string(),
        permissions: ROLE_ADMIN,
    })?;
    tracing::info!(user = admin.id, username = %admin.username, "bootstrapped administrator");
    Ok(admin)
}
