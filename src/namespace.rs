//! Namespace allocation for custom short paths
//!
//! A custom path lands either in the global namespace (bare suffix) or in the
//! requesting user's personal namespace (`@{username}/{suffix}`). The caller
//! picks the namespace explicitly; it is never inferred from permissions.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SUFFIX_LEN, RANDOM_PATH_LEN, RESERVED_PATHS};
use crate::entity::Actor;
use crate::error::{LinkgateError, Result};
use crate::policy::{can_create_link, require, Operation};

pub const PERSONAL_PREFIX: char = '@';

/// Where a custom path is placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Namespace {
    Global,
    /// `@{username}/`
    Personal(String),
}

impl Namespace {
    /// Full stored path for a sanitized suffix
    pub fn path(&self, suffix: &str) -> String {
        match self {
            Namespace::Global => suffix.to_string(),
            Namespace::Personal(user) => format!("{PERSONAL_PREFIX}{user}/{suffix}"),
        }
    }

    /// Namespace a stored path belongs to
    pub fn of(path: &str) -> Namespace {
        match path.strip_prefix(PERSONAL_PREFIX).and_then(|rest| rest.split_once('/')) {
            Some((user, _)) => Namespace::Personal(user.to_string()),
            None => Namespace::Global,
        }
    }

    fn operation(&self) -> Operation {
        match self {
            Namespace::Global => Operation::CreateGlobalLink,
            Namespace::Personal(_) => Operation::CreatePersonalLink,
        }
    }
}

/// A caller's request for a custom path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPath {
    pub suffix: String,
    #[serde(default)]
    pub use_global: bool,
}

impl CustomPath {
    pub fn personal(suffix: impl Into<String>) -> Self {
        CustomPath { suffix: suffix.into(), use_global: false }
    }

    pub fn global(suffix: impl Into<String>) -> Self {
        CustomPath { suffix: suffix.into(), use_global: true }
    }
}

/// Flatten path separators so a suffix can never escape its namespace
pub fn sanitize(suffix: &str) -> String {
    suffix.chars().filter(|c| *c != '/').collect()
}

/// Compute the final stored path for a custom-path request.
///
/// Returns `Ok(None)` when no custom path was requested (empty suffix); the
/// server then assigns a random path. The uniqueness check is left to the
/// store's atomic insert.
pub fn allocate(actor: &Actor, suffix: &str, use_global: bool) -> Result<Option<String>> {
    if suffix.is_empty() {
        return Ok(None);
    }
    let clean = sanitize(suffix);
    let namespace = if use_global {
        Namespace::Global
    } else {
        match actor.username() {
            Some(name) => Namespace::Personal(name.to_string()),
            None => return require(false, actor, Operation::CreatePersonalLink).map(|_| None),
        }
    };
    require(can_create_link(actor, Some(&namespace)), actor, namespace.operation())?;
    validate_suffix(&clean)?;
    if namespace == Namespace::Global {
        validate_global(&clean)?;
    }
    Ok(Some(namespace.path(&clean)))
}

fn validate_suffix(suffix: &str) -> Result<()> {
    if suffix.is_empty() {
        return Err(LinkgateError::invalid("custom path is empty after removing '/'"));
    }
    if suffix.len() > MAX_SUFFIX_LEN {
        return Err(LinkgateError::invalid(format!(
            "custom path longer than {MAX_SUFFIX_LEN} bytes"
        )));
    }
    if suffix.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LinkgateError::invalid("custom path contains whitespace or control characters"));
    }
    Ok(())
}

fn validate_global(path: &str) -> Result<()> {
    if path.starts_with(PERSONAL_PREFIX) {
        return Err(LinkgateError::invalid(format!(
            "global paths may not start with '{PERSONAL_PREFIX}'"
        )));
    }
    if RESERVED_PATHS.contains(&path) {
        return Err(LinkgateError::invalid(format!("'{path}' is reserved")));
    }
    Ok(())
}

/// Source of server-assigned paths
pub trait PathGenerator: Send + Sync {
    fn generate(&self) -> Result<String>;
}

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Base62 paths from the OS random source
#[derive(Debug, Clone, Copy)]
pub struct RandomPathGenerator {
    len: usize,
}

impl RandomPathGenerator {
    pub fn new(len: usize) -> Self {
        RandomPathGenerator { len }
    }
}

impl Default for RandomPathGenerator {
    fn default() -> Self {
        Self::new(RANDOM_PATH_LEN)
    }
}

impl PathGenerator for RandomPathGenerator {
    fn generate(&self) -> Result<String> {
        // Rejection sampling keeps the alphabet unbiased: 248 = 62 * 4
        let limit = (256 / ALPHABET.len() * ALPHABET.len()) as u8;
        let mut out = String::with_capacity(self.len);
        let mut buf = [0u8; 32];
        while out.len() < self.len {
            getrandom::getrandom(&mut buf)
                .map_err(|e| LinkgateError::Storage(format!("random source: {e}")))?;
            for b in buf.iter().filter(|b| **b < limit) {
                if out.len() == self.len {
                    break;
                }
                out.push(ALPHABET[*b as usize % ALPHABET.len()] as char);
            }
        }
        Ok(out)
    }
}
