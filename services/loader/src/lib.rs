//! Loader - Runs the normalization pipelines and loads their output
//!
//! Responsibilities:
//! - Drive single-period and bulk runs over the collector's report files
//! - Load normalized records with insert, upsert or overwrite semantics
//! - Record every run, with its captured log output, in the `pipeline_logs` journal
//! - Export normalized records to CSV for dry runs

pub mod config;
pub mod error;
pub mod export;
pub mod journal;
pub mod load;
pub mod pipeline;
pub mod runlog;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{JournalError, LoadError, PipelineError};
pub use journal::{PgJournal, RunHandle, RunJournal, RunStatus};
pub use load::{load_records, LoadMethod, PgSink, RecordSink};
pub use pipeline::{pipeline_name, run_journaled, Pipeline, RunMode, RunOutput, RunReport, Target};
pub use runlog::RunLog;
