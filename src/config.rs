//! Runtime configuration from the environment

use std::path::PathBuf;
use std::str::FromStr;

use crate::db::DEFAULT_MAP_SIZE;
use crate::error::{LinkgateError, Result};

pub const ENV_DB: &str = "LINKGATE_DB";
pub const ENV_MAP_SIZE: &str = "LINKGATE_MAP_SIZE";
pub const ENV_PORT: &str = "PORT";
pub const ENV_ADMIN: &str = "LINKGATE_ADMIN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// LMDB environment directory
    pub db_path: PathBuf,
    pub map_size: usize,
    pub port: u16,
    /// Username to create as administrator when the store is not bootstrapped
    pub bootstrap_admin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("./data/linkgate.mdb"),
            map_size: DEFAULT_MAP_SIZE,
            port: 3000,
            bootstrap_admin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut c = Config::default();
        if let Some(v) = get(ENV_DB) {
            c.db_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_MAP_SIZE) {
            c.map_size = parse(ENV_MAP_SIZE, &v)?;
        }
        if let Some(v) = get(ENV_PORT) {
            c.port = parse(ENV_PORT, &v)?;
        }
        c.bootstrap_admin = get(ENV_ADMIN).filter(|v| !v.trim().is_empty());
        Ok(c)
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| LinkgateError::invalid(format!("{key}={raw:?}: {e}")))
}
