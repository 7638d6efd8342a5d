//! Attack vector tests for linkgate
//!
//! These tests verify that the guards deny unauthorized operations and
//! that denials leak nothing about the capability model.

use std::sync::Arc;

use linkgate::{
    allocate, bootstrap, Actor, Capability, CustomPath, LinkAccessGuard, LinkStore, LinkgateError,
    LmdbStore, PermissionSet, Principal, UserAdministrationGuard, ROLE_ADMIN, ROLE_PRIVILEGED,
    ROLE_REGULAR,
};
use tempfile::TempDir;

struct World {
    _dir: TempDir,
    links: LinkAccessGuard<Arc<LmdbStore>>,
    users: UserAdministrationGuard<Arc<LmdbStore>>,
}

fn setup() -> World {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LmdbStore::open(dir.path()).unwrap());
    bootstrap(&store, "root").unwrap();
    World {
        _dir: dir,
        links: LinkAccessGuard::new(store.clone()),
        users: UserAdministrationGuard::new(store),
    }
}

fn actor(w: &World, name: &str) -> Actor {
    let u = w.users.register(name).unwrap();
    Actor::Principal(u.principal())
}

/// ATTACK: Namespace squatting - claim a path under someone else's prefix
#[test]
fn attack_namespace_squatting() {
    let w = setup();
    let mallory = actor(&w, "mallory");

    // A global path that looks like a personal one
    let r = w.links.create_link(&mallory, "https://evil.example", Some(&CustomPath::global("@alice/x")));
    // Expected: DENIED - mallory lacks CreateAny
    assert_eq!(r, Err(LinkgateError::Forbidden));

    // Even with CreateAny the '@' prefix is reserved for personal namespaces
    let root = Actor::Principal(w.users.principal(1).unwrap());
    w.users.update_permissions(&root, mallory.id().unwrap(), ROLE_PRIVILEGED).unwrap();
    let mallory = Actor::Principal(w.users.principal(mallory.id().unwrap()).unwrap());
    let r = w.links.create_link(&mallory, "https://evil.example", Some(&CustomPath::global("@alice/x")));
    assert!(matches!(r, Err(LinkgateError::InvalidInput(_))));
}

/// ATTACK: Path traversal in a personal suffix
#[test]
fn attack_suffix_traversal() {
    let w = setup();
    let mallory = actor(&w, "mallory");
    let link = w
        .links
        .create_link(&mallory, "https://evil.example", Some(&CustomPath::personal("../../alice/x")))
        .unwrap();
    // Separators are flattened; the link stays under mallory's prefix
    assert_eq!(link.path, "@mallory/....alicex");
}

/// ATTACK: Forged principal - username does not match the namespace owner
#[test]
fn attack_forged_username() {
    let forged = Actor::Principal(Principal {
        id: 42,
        username: "alice".into(),
        permissions: ROLE_REGULAR,
    });
    // The allocator uses the principal's own username; it never escapes it
    assert_eq!(allocate(&forged, "x", false).unwrap().as_deref(), Some("@alice/x"));
    let stranger = Actor::Principal(Principal {
        id: 43,
        username: "bob".into(),
        permissions: PermissionSet::NONE,
    });
    assert_eq!(allocate(&stranger, "x", false), Err(LinkgateError::Forbidden));
}

/// ATTACK: Self-escalation through user administration
#[test]
fn attack_self_grant_escalation() {
    let w = setup();
    let mallory = actor(&w, "mallory");
    let id = mallory.id().unwrap();
    assert_eq!(w.users.update_permissions(&mallory, id, ROLE_ADMIN), Err(LinkgateError::Forbidden));
    assert_eq!(
        w.users.grant_capability(&mallory, id, Capability::USER_MANAGE),
        Err(LinkgateError::Forbidden)
    );
    assert_eq!(w.users.set_role(&mallory, id, "admin"), Err(LinkgateError::Forbidden));
    assert_eq!(w.users.principal(id).unwrap().permissions, ROLE_REGULAR);
}

/// ATTACK: Unknown high bits do not unlock anything
#[test]
fn attack_unknown_bits() {
    let w = setup();
    let ghost = Actor::Principal(Principal {
        id: 999,
        username: "ghost".into(),
        permissions: PermissionSet::from_bits(!0 << 7),
    });
    assert_eq!(w.users.list_users(&ghost), Err(LinkgateError::Forbidden));
    let r = w.links.create_link(&ghost, "https://a.example", Some(&CustomPath::global("g")));
    assert_eq!(r, Err(LinkgateError::Forbidden));
}

/// ATTACK: Deleting a victim's link or reading its stats
#[test]
fn attack_foreign_link_access() {
    let w = setup();
    let alice = actor(&w, "alice");
    let mallory = actor(&w, "mallory");
    let link = w.links.create_link(&alice, "https://a.example", None).unwrap();

    let e = w.links.delete_link(&mallory, link.id).unwrap_err();
    assert_eq!(e, LinkgateError::Forbidden);
    // The denial does not name the capability
    assert_eq!(e.to_string(), "forbidden");
    assert_eq!(w.links.link_stats(&mallory, link.id), Err(LinkgateError::Forbidden));
    assert_eq!(w.links.delete_link(&Actor::Anonymous, link.id), Err(LinkgateError::Forbidden));
    assert!(w.links.store().find_link_by_id(link.id).unwrap().is_some());
}

/// ATTACK: Enumerating user ids without UserManage
#[test]
fn attack_user_id_enumeration() {
    let w = setup();
    let mallory = actor(&w, "mallory");
    // Existing and missing ids look the same to a non-admin
    assert_eq!(w.users.delete_user(&mallory, 1), Err(LinkgateError::Forbidden));
    assert_eq!(w.users.delete_user(&mallory, 12345), Err(LinkgateError::Forbidden));
}

/// ATTACK: Learning path rules without the capability to use them
#[test]
fn attack_rule_discovery() {
    let w = setup();
    let mallory = actor(&w, "mallory");
    for suffix in ["api", "@x", "a b", "///"] {
        let r = w.links.create_link(&mallory, "https://a.example", Some(&CustomPath::global(suffix)));
        assert_eq!(r, Err(LinkgateError::Forbidden), "{suffix:?}");
    }
}
