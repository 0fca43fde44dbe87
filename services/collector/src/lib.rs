//! Collector - Locates and retrieves the published quarterly report workbooks
//!
//! Responsibilities:
//! - Map report families and periods to file names and object keys
//! - List available periods in a local directory or an S3-compatible bucket
//! - Download workbooks and decode the family's sheet into a `RawSheet`
//! - Fingerprint downloaded files with SHA-256

pub mod config;
pub mod error;
pub mod naming;
pub mod source;
pub mod store;
pub mod workbook;

pub use config::SourceConfig;
pub use error::SourceError;
pub use naming::{parse_quarter, PeriodKey};
pub use source::{content_hash, Collector, ReportSource, SourceFile};
pub use store::{HttpObjectStore, LocalStore, ObjectStore};
