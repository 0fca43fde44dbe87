//! Source selection read from the environment.

use std::path::PathBuf;

use crate::error::SourceError;
use crate::store::{HttpObjectStore, LocalStore, ObjectStore};

pub const DEFAULT_LOCAL_DIR: &str = "./data";

#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Local {
        root: PathBuf,
    },
    Remote {
        endpoint: String,
        bucket: String,
        token: Option<String>,
    },
}

impl SourceConfig {
    /// Reads `SOURCE`, `LOCAL_DATA_DIR`, `OBJECT_STORE_URL`, `BUCKET_NAME`
    /// and `OBJECT_STORE_TOKEN`.
    pub fn from_env() -> Result<Self, SourceError> {
        Self::from_env_with(None)
    }

    /// Like `from_env`, with `kind` taking precedence over `SOURCE`.
    pub fn from_env_with(kind: Option<&str>) -> Result<Self, SourceError> {
        let kind = match kind {
            Some(kind) => kind.to_string(),
            None => std::env::var("SOURCE").unwrap_or_else(|_| "local".to_string()),
        };
        Self::from_parts(
            &kind,
            std::env::var("LOCAL_DATA_DIR").ok(),
            std::env::var("OBJECT_STORE_URL").ok(),
            std::env::var("BUCKET_NAME").ok(),
            std::env::var("OBJECT_STORE_TOKEN").ok(),
        )
    }

    pub fn from_parts(
        kind: &str,
        local_dir: Option<String>,
        endpoint: Option<String>,
        bucket: Option<String>,
        token: Option<String>,
    ) -> Result<Self, SourceError> {
        match kind.trim().to_lowercase().as_str() {
            "local" => Ok(SourceConfig::Local {
                root: PathBuf::from(local_dir.unwrap_or_else(|| DEFAULT_LOCAL_DIR.to_string())),
            }),
            "remote" | "s3" => {
                let bucket = bucket
                    .filter(|b| !b.trim().is_empty())
                    .ok_or_else(|| SourceError::Configuration("BUCKET_NAME must be set for remote source".into()))?;
                let endpoint = endpoint
                    .filter(|e| !e.trim().is_empty())
                    .ok_or_else(|| SourceError::Configuration("OBJECT_STORE_URL must be set for remote source".into()))?;
                Ok(SourceConfig::Remote {
                    endpoint,
                    bucket,
                    token: token.filter(|t| !t.is_empty()),
                })
            }
            other => Err(SourceError::Configuration(format!(
                "invalid source '{}': use 'local' or 'remote'",
                other
            ))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SourceConfig::Local { root } => format!("local:{}", root.display()),
            SourceConfig::Remote { endpoint, bucket, .. } => format!("remote:{}/{}", endpoint, bucket),
        }
    }

    pub fn build(&self) -> Result<Box<dyn ObjectStore>, SourceError> {
        Ok(match self {
            SourceConfig::Local { root } => Box::new(LocalStore::new(root.clone())),
            SourceConfig::Remote { endpoint, bucket, token } => {
                Box::new(HttpObjectStore::new(endpoint, bucket, token.clone())?)
            }
        })
    }
}
