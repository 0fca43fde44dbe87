use collector::{PeriodKey, SourceError};
use normalizer::{NormalizeError, ReportFamily};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid load method '{0}': choose from [insert, upsert, overwrite]")]
    InvalidMethod(String),

    #[error("identity collision on insert into {table}: {identity}")]
    IdentityCollision { table: String, identity: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no report files found for {0}")]
    NoFiles(ReportFamily),

    #[error("source unavailable for {family} {period}")]
    SourceUnavailable { family: ReportFamily, period: PeriodKey },

    #[error("bulk run for {family} produced no loadable period ({failed} failed)")]
    NothingLoaded { family: ReportFamily, failed: usize },

    #[error(transparent)]
    Structural(#[from] NormalizeError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Journal(#[from] JournalError),
}
