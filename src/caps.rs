//! Capability bits and the permission bitmask

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// A single named permission bit.
///
/// Bit positions are persisted inside every user's permission field, so new
/// capabilities may only take the next unused bit. Never renumber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability(u64);

impl Capability {
    /// The "no capability" value. `PermissionSet::has` is always false for it.
    pub const NONE: Capability = Capability(0);

    // Link creation
    pub const CREATE_PREFIX: Capability = Capability(1);
    pub const CREATE_ANY: Capability = Capability(1 << 1);

    // Link deletion
    pub const DELETE_OWN: Capability = Capability(1 << 2);
    pub const DELETE_ANY: Capability = Capability(1 << 3);

    // Click statistics
    pub const VIEW_OWN_STATS: Capability = Capability(1 << 4);
    pub const VIEW_ANY_STATS: Capability = Capability(1 << 5);

    // User administration
    pub const USER_MANAGE: Capability = Capability(1 << 6);

    /// Every declared capability, in bit order.
    pub const ALL: [Capability; 7] = [
        Capability::CREATE_PREFIX,
        Capability::CREATE_ANY,
        Capability::DELETE_OWN,
        Capability::DELETE_ANY,
        Capability::VIEW_OWN_STATS,
        Capability::VIEW_ANY_STATS,
        Capability::USER_MANAGE,
    ];

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Stable name used by the config, CLI and HTTP surfaces
    pub fn name(self) -> Option<&'static str> {
        crate::constants::CAPS
            .iter()
            .find(|(_, c)| *c == self)
            .map(|(n, _)| *n)
    }

    /// Look up a capability by its stable name
    pub fn from_name(name: &str) -> Option<Capability> {
        crate::constants::CAPS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(n) => f.write_str(n),
            None => write!(f, "0x{:x}", self.0),
        }
    }
}

/// Mask of all bits currently backed by a declared capability.
pub const KNOWN_BITS: u64 = {
    let mut mask = 0;
    let mut i = 0;
    while i < Capability::ALL.len() {
        mask |= Capability::ALL[i].bits();
        i += 1;
    }
    mask
};

/// A set of capabilities stored as one unsigned integer.
///
/// Bits with no declared capability are ignored by `has` and carried through
/// `grant`/`revoke` untouched, so a mask written by a newer build survives a
/// read-modify-write by an older one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u64);

impl PermissionSet {
    pub const NONE: PermissionSet = PermissionSet(0);

    /// Wrap a raw persisted mask. Unknown bits are retained.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        PermissionSet(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// `(set & c) == c`, never true for `Capability::NONE`
    #[inline]
    pub const fn has(self, c: Capability) -> bool {
        c.0 != 0 && (self.0 & c.0) == c.0
    }

    #[inline]
    pub const fn grant(self, c: Capability) -> Self {
        PermissionSet(self.0 | c.0)
    }

    #[inline]
    pub const fn revoke(self, c: Capability) -> Self {
        PermissionSet(self.0 & !c.0)
    }

    /// Declared capabilities present in the set
    pub fn capabilities(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.has(*c))
    }

    /// Bits set in the mask with no declared capability
    #[inline]
    pub const fn unknown_bits(self) -> u64 {
        self.0 & !KNOWN_BITS
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 & KNOWN_BITS == 0
    }
}

impl From<Capability> for PermissionSet {
    fn from(c: Capability) -> Self {
        PermissionSet(c.0)
    }
}

impl BitOr<Capability> for PermissionSet {
    type Output = PermissionSet;

    fn bitor(self, rhs: Capability) -> PermissionSet {
        self.grant(rhs)
    }
}

impl BitOr for Capability {
    type Output = PermissionSet;

    fn bitor(self, rhs: Capability) -> PermissionSet {
        PermissionSet(self.0).grant(rhs)
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = crate::constants::caps_to_names(*self);
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}
