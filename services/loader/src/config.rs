//! Loader settings read from the environment (after `.env` via dotenvy).

use anyhow::{Context, Result};
use normalizer::IdentityStrategy;
use std::path::PathBuf;

use crate::load::LoadMethod;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_url: Option<String>,
    /// Journal database; falls back to `db_url`.
    pub log_db_url: Option<String>,
    pub max_connections: u32,
    pub identity: IdentityStrategy,
    pub load_method: Option<LoadMethod>,
    pub pipeline_target: Option<String>,
    /// Directory for per-run log files; unset keeps run logs in the journal only.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let identity = match non_empty("IDENTITY_MODE") {
            Some(mode) => mode.parse::<IdentityStrategy>().map_err(anyhow::Error::msg)?,
            None => IdentityStrategy::default(),
        };
        let load_method = non_empty("LOAD_METHOD")
            .map(|m| m.parse::<LoadMethod>())
            .transpose()
            .context("LOAD_METHOD is invalid")?;

        Ok(Self {
            db_url: non_empty("DB_URL"),
            log_db_url: non_empty("LOG_DB_URL"),
            max_connections: non_empty("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            identity,
            load_method,
            pipeline_target: non_empty("PIPELINE_TARGET"),
            log_dir: non_empty("LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn db_url(&self) -> Result<&str> {
        self.db_url.as_deref().context("DB_URL env var missing")
    }

    pub fn journal_db_url(&self) -> Result<&str> {
        match self.log_db_url.as_deref() {
            Some(url) => Ok(url),
            None => self.db_url(),
        }
    }
}
