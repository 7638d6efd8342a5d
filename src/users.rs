//! User administration gated by `USER_MANAGE`, plus open registration
//!
//! The capability check runs before the target lookup so that callers
//! without `USER_MANAGE` cannot tell which user ids exist.

use crate::caps::{Capability, PermissionSet};
use crate::constants::{role_by_name, DEFAULT_ROLE, MAX_USERNAME_LEN};
use crate::entity::{Actor, NewUser, Principal, User, UserId};
use crate::error::{LinkgateError, Result};
use crate::policy::{can_manage_users, require, Operation};
use crate::store::LinkStore;

pub struct UserAdministrationGuard<S> {
    store: S,
}

impl<S: LinkStore> UserAdministrationGuard<S> {
    pub fn new(store: S) -> Self {
        UserAdministrationGuard { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace a user's permission mask exactly, unknown bits included
    pub fn update_permissions(
        &self,
        actor: &Actor,
        user_id: UserId,
        permissions: PermissionSet,
    ) -> Result<()> {
        self.authorize(actor)?;
        self.store_permissions(actor, user_id, permissions)
    }

    pub fn grant_capability(&self, actor: &Actor, user_id: UserId, c: Capability) -> Result<PermissionSet> {
        self.modify(actor, user_id, |p| p.grant(c))
    }

    pub fn revoke_capability(&self, actor: &Actor, user_id: UserId, c: Capability) -> Result<PermissionSet> {
        self.modify(actor, user_id, |p| p.revoke(c))
    }

    /// Replace a user's permissions with a named role bundle
    pub fn set_role(&self, actor: &Actor, user_id: UserId, role: &str) -> Result<PermissionSet> {
        self.authorize(actor)?;
        let permissions =
            role_by_name(role).ok_or_else(|| LinkgateError::invalid(format!("unknown role '{role}'")))?;
        self.store_permissions(actor, user_id, permissions)?;
        Ok(permissions)
    }

    /// Delete a user. Links they own are left in place.
    pub fn delete_user(&self, actor: &Actor, user_id: UserId) -> Result<()> {
        self.authorize(actor)?;
        if !self.store.delete_user(user_id)? {
            return Err(LinkgateError::NotFound("user"));
        }
        tracing::info!(actor = ?actor.id(), user = user_id, "deleted user");
        Ok(())
    }

    pub fn list_users(&self, actor: &Actor) -> Result<Vec<User>> {
        self.authorize(actor)?;
        self.store.list_users()
    }

    /// Open registration; new users get the default role
    pub fn register(&self, username: &str) -> Result<User> {
        validate_username(username)?;
        let user = self.store.insert_user(NewUser {
            username: username.to_string(),
            permissions: DEFAULT_ROLE,
        })?;
        tracing::info!(user = user.id, username = %user.username, "registered user");
        Ok(user)
    }

    /// Resolve an authenticated user id into a principal
    pub fn principal(&self, user_id: UserId) -> Result<Principal> {
        self.store
            .find_user_by_id(user_id)?
            .map(|u| u.principal())
            .ok_or(LinkgateError::NotFound("user"))
    }

    fn authorize(&self, actor: &Actor) -> Result<()> {
        require(can_manage_users(actor), actor, Operation::ManageUsers)
    }

    // One store-level read-modify-write: unknown bits and concurrent grants survive
    fn modify(
        &self,
        actor: &Actor,
        user_id: UserId,
        f: impl Fn(PermissionSet) -> PermissionSet,
    ) -> Result<PermissionSet> {
        self.authorize(actor)?;
        let permissions = self
            .store
            .modify_user_permissions(user_id, &f)?
            .ok_or(LinkgateError::NotFound("user"))?;
        tracing::info!(actor = ?actor.id(), user = user_id, permissions = %permissions, "updated permissions");
        Ok(permissions)
    }

    fn store_permissions(&self, actor: &Actor, user_id: UserId, permissions: PermissionSet) -> Result<()> {
        if !self.store.update_user_permissions(user_id, permissions)? {
            return Err(LinkgateError::NotFound("user"));
        }
        tracing::info!(actor = ?actor.id(), user = user_id, permissions = %permissions, "updated permissions");
        Ok(())
    }
}

/// Usernames are 1..=32 characters of `[A-Za-z0-9_.-]`
pub fn validate_username(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_USERNAME_LEN {
        return Err(LinkgateError::invalid(format!(
            "username must be 1 to {MAX_USERNAME_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return Err(LinkgateError::invalid("username may only contain letters, digits, '_', '.' and '-'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ROLE_ADMIN, ROLE_EDITOR, ROLE_REGULAR};
    use crate::store::MemoryStore;

    fn setup() -> (UserAdministrationGuard<MemoryStore>, Actor, User) {
        let guard = UserAdministrationGuard::new(MemoryStore::new());
        let admin = guard
            .store()
            .insert_user(NewUser { username: "root".into(), permissions: ROLE_ADMIN })
            .unwrap();
        let alice = guard.register("alice").unwrap();
        (guard, Actor::Principal(admin.principal()), alice)
    }

    #[test]
    fn register_uses_default_role() {
        let (guard, _, alice) = setup();
        assert_eq!(alice.permissions, ROLE_REGULAR);
        assert!(matches!(guard.register("alice"), Err(LinkgateError::Conflict(_))));
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        for bad in ["", "a b", "@x", "a/b", long.as_str()] {
            assert!(matches!(guard.register(bad), Err(LinkgateError::InvalidInput(_))), "{bad:?}");
        }
    }

    #[test]
    fn non_admin_is_forbidden_before_lookup() {
        let (guard, _, alice) = setup();
        let alice = Actor::Principal(alice.principal());
        assert_eq!(guard.delete_user(&alice, 999), Err(LinkgateError::Forbidden));
        assert_eq!(guard.update_permissions(&alice, 999, ROLE_ADMIN), Err(LinkgateError::Forbidden));
        assert_eq!(guard.list_users(&alice).unwrap_err(), LinkgateError::Forbidden);
        assert_eq!(guard.list_users(&Actor::Anonymous).unwrap_err(), LinkgateError::Forbidden);
    }

    #[test]
    fn editor_cannot_manage_users() {
        let (guard, _, alice) = setup();
        let ed = guard
            .store()
            .insert_user(NewUser { username: "ed".into(), permissions: ROLE_EDITOR })
            .unwrap();
        let ed = Actor::Principal(ed.principal());
        assert_eq!(guard.set_role(&ed, alice.id, "admin"), Err(LinkgateError::Forbidden));
    }

    #[test]
    fn admin_updates_and_deletes() {
        let (guard, admin, alice) = setup();
        guard.update_permissions(&admin, alice.id, ROLE_EDITOR).unwrap();
        assert_eq!(guard.principal(alice.id).unwrap().permissions, ROLE_EDITOR);
        guard.delete_user(&admin, alice.id).unwrap();
        assert_eq!(guard.delete_user(&admin, alice.id), Err(LinkgateError::NotFound("user")));
        assert_eq!(guard.update_permissions(&admin, alice.id, ROLE_EDITOR), Err(LinkgateError::NotFound("user")));
        assert_eq!(guard.principal(alice.id).unwrap_err(), LinkgateError::NotFound("user"));
    }

    #[test]
    fn concurrent_grants_are_all_kept() {
        let (guard, admin, alice) = setup();
        guard.update_permissions(&admin, alice.id, PermissionSet::NONE).unwrap();
        std::thread::scope(|s| {
            for c in Capability::ALL {
                let (guard, admin) = (&guard, &admin);
                s.spawn(move || guard.grant_capability(admin, alice.id, c).unwrap());
            }
        });
        assert_eq!(guard.principal(alice.id).unwrap().permissions, ROLE_ADMIN);
    }

    #[test]
    fn grant_on_missing_user_is_not_found() {
        let (guard, admin, _) = setup();
        assert_eq!(
            guard.grant_capability(&admin, 999, Capability::CREATE_ANY),
            Err(LinkgateError::NotFound("user"))
        );
    }

    #[test]
    fn grant_and_revoke_keep_unknown_bits() {
        let (guard, admin, alice) = setup();
        let odd = ROLE_REGULAR.bits() | (1 << 40);
        guard.update_permissions(&admin, alice.id, PermissionSet::from_bits(odd)).unwrap();
        let p = guard.grant_capability(&admin, alice.id, Capability::CREATE_ANY).unwrap();
        assert!(p.has(Capability::CREATE_ANY));
        let p = guard.revoke_capability(&admin, alice.id, Capability::DELETE_OWN).unwrap();
        assert!(!p.has(Capability::DELETE_OWN));
        assert_eq!(p.unknown_bits(), 1 << 40);
        assert_eq!(guard.principal(alice.id).unwrap().permissions, p);
    }

    #[test]
    fn set_role_by_name() {
        let (guard, admin, alice) = setup();
        assert_eq!(guard.set_role(&admin, alice.id, "privileged").unwrap().bits(), 0b10111);
        assert!(matches!(guard.set_role(&admin, alice.id, "root"), Err(LinkgateError::InvalidInput(_))));
    }

    #[test]
    fn admin_may_demote_itself() {
        let (guard, admin, _) = setup();
        let id = admin.id().unwrap();
        guard.update_permissions(&admin, id, PermissionSet::NONE).unwrap();
        let demoted = Actor::Principal(guard.principal(id).unwrap());
        assert_eq!(guard.list_users(&demoted).unwrap_err(), LinkgateError::Forbidden);
    }
}
