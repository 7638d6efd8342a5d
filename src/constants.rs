//! Permission names, role bundles and path rules

use crate::caps::{Capability, PermissionSet};

// Role bundles (pre-configured permission sets)
pub const ROLE_GUEST: PermissionSet = PermissionSet::NONE;
pub const ROLE_REGULAR: PermissionSet = PermissionSet::NONE
    .grant(Capability::CREATE_PREFIX)
    .grant(Capability::DELETE_OWN)
    .grant(Capability::VIEW_OWN_STATS);
pub const ROLE_PRIVILEGED: PermissionSet = ROLE_REGULAR.grant(Capability::CREATE_ANY);
pub const ROLE_EDITOR: PermissionSet = ROLE_PRIVILEGED
    .grant(Capability::DELETE_ANY)
    .grant(Capability::VIEW_ANY_STATS);
pub const ROLE_ADMIN: PermissionSet = ROLE_EDITOR.grant(Capability::USER_MANAGE);

/// Role given to self-registered users
pub const DEFAULT_ROLE: PermissionSet = ROLE_REGULAR;

// Short path rules
pub const RANDOM_PATH_LEN: usize = 6;
pub const MAX_RANDOM_ATTEMPTS: usize = 5;
pub const MAX_SUFFIX_LEN: usize = 64;
pub const MAX_USERNAME_LEN: usize = 32;
pub const MAX_URL_LEN: usize = 2048;

/// Global paths that collide with server routes
pub const RESERVED_PATHS: &[&str] = &[
    "api",
    "auth",
    "admin",
    "assets",
    "static",
    "links",
    "users",
    "health",
    "favicon.ico",
    "robots.txt",
];

// Capability name mappings
pub(crate) const CAPS: &[(&str, Capability)] = &[
    ("create_prefix", Capability::CREATE_PREFIX),
    ("create_any", Capability::CREATE_ANY),
    ("delete_own", Capability::DELETE_OWN),
    ("delete_any", Capability::DELETE_ANY),
    ("view_own_stats", Capability::VIEW_OWN_STATS),
    ("view_any_stats", Capability::VIEW_ANY_STATS),
    ("user_manage", Capability::USER_MANAGE),
];

const ROLES: &[(&str, PermissionSet)] = &[
    ("guest", ROLE_GUEST),
    ("regular", ROLE_REGULAR),
    ("privileged", ROLE_PRIVILEGED),
    ("editor", ROLE_EDITOR),
    ("admin", ROLE_ADMIN),
];

/// Convert a permission set to a list of capability names
pub fn caps_to_names(set: PermissionSet) -> Vec<&'static str> {
    CAPS.iter()
        .filter(|(_, c)| set.has(*c))
        .map(|(n, _)| *n)
        .collect()
}

/// Convert a list of capability names to a permission set (unknown names are skipped)
pub fn names_to_caps(names: &[&str]) -> PermissionSet {
    names
        .iter()
        .filter_map(|n| Capability::from_name(n))
        .fold(PermissionSet::NONE, |set, c| set.grant(c))
}

/// Look up a role bundle by name
pub fn role_by_name(name: &str) -> Option<PermissionSet> {
    ROLES.iter().find(|(n, _)| *n == name).map(|(_, r)| *r)
}

/// Name of the role bundle exactly matching `set`, if any
pub fn role_name(set: PermissionSet) -> Option<&'static str> {
    ROLES.iter().find(|(_, r)| *r == set).map(|(n, _)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_nest() {
        assert_eq!(ROLE_REGULAR.bits(), 1 | 4 | 16);
        assert_eq!(ROLE_PRIVILEGED.revoke(Capability::CREATE_ANY), ROLE_REGULAR);
        assert_eq!(ROLE_ADMIN.revoke(Capability::USER_MANAGE), ROLE_EDITOR);
        assert_eq!(ROLE_ADMIN.bits(), 0x7F);
        assert!(!ROLE_EDITOR.has(Capability::USER_MANAGE));
        assert!(!ROLE_REGULAR.has(Capability::CREATE_ANY));
    }

    #[test]
    fn names_round_trip() {
        let names = caps_to_names(ROLE_REGULAR);
        assert_eq!(names, vec!["create_prefix", "delete_own", "view_own_stats"]);
        assert_eq!(names_to_caps(&names), ROLE_REGULAR);
        assert_eq!(names_to_caps(&["bogus", "user_manage"]), PermissionSet::from(Capability::USER_MANAGE));
    }

    #[test]
    fn role_lookup() {
        assert_eq!(role_by_name("editor"), Some(ROLE_EDITOR));
        assert_eq!(role_by_name("root"), None);
        assert_eq!(role_name(ROLE_GUEST), Some("guest"));
        assert_eq!(role_name(ROLE_REGULAR.grant(Capability::DELETE_ANY)), None);
    }
}
