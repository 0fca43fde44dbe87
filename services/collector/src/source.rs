//! Period discovery and file retrieval on top of an `ObjectStore`.

use async_trait::async_trait;
use normalizer::{RawSheet, ReportFamily};
use sha2::{Digest, Sha256};

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::naming::{file_name, object_key, periods_in, PeriodKey};
use crate::store::ObjectStore;
use crate::workbook::read_sheet;

/// A fetched report: the decoded target sheet plus where it came from.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub family: ReportFamily,
    pub period: PeriodKey,
    pub file_name: String,
    pub location: String,
    pub content_hash: String,
    pub sheet: RawSheet,
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Every period published for the family, oldest first.
    async fn discover(&self, family: ReportFamily) -> Result<Vec<PeriodKey>, SourceError>;

    /// The file for one period. `None` when it is missing, unreadable, lacks
    /// the family's sheet, or the sheet is empty; the reason is logged.
    async fn fetch(&self, family: ReportFamily, period: PeriodKey) -> Option<SourceFile>;

    async fn latest(&self, family: ReportFamily) -> Result<Option<PeriodKey>, SourceError> {
        Ok(self.discover(family).await?.into_iter().max())
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

pub struct Collector {
    store: Box<dyn ObjectStore>,
}

impl Collector {
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        Ok(Self::new(config.build()?))
    }

    /// Raw workbook bytes for one period, without decoding.
    pub async fn download(&self, family: ReportFamily, period: PeriodKey) -> Result<Vec<u8>, SourceError> {
        self.store.get(&object_key(family, period)).await
    }

    pub fn location(&self, family: ReportFamily, period: PeriodKey) -> String {
        self.store.location(&object_key(family, period))
    }
}

#[async_trait]
impl ReportSource for Collector {
    async fn discover(&self, family: ReportFamily) -> Result<Vec<PeriodKey>, SourceError> {
        let keys = self.store.list(family.storage_prefix()).await?;
        let periods = periods_in(family, &keys);
        tracing::info!(family = %family, files = keys.len(), periods = periods.len(), "discovered periods");
        Ok(periods)
    }

    async fn fetch(&self, family: ReportFamily, period: PeriodKey) -> Option<SourceFile> {
        let location = self.location(family, period);

        let bytes = match self.download(family, period).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%location, error = %e, "failed to retrieve report file");
                return None;
            }
        };
        let hash = content_hash(&bytes);

        let sheet = match read_sheet(&bytes, family.sheet_name()) {
            Ok(sheet) => sheet,
            Err(e) => {
                tracing::error!(%location, error = %e, "failed to decode report file");
                return None;
            }
        };

        if sheet.is_empty() {
            tracing::warn!(%location, sheet = family.sheet_name(), "report sheet is empty");
            return None;
        }

        tracing::info!(%location, rows = sheet.height(), content_hash = %hash, "fetched report");
        Some(SourceFile {
            family,
            period,
            file_name: file_name(family, period),
            location,
            content_hash: hash,
            sheet,
        })
    }
}
