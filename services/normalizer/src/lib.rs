//! Normalizer - Turns quarterly financial report sheets into long-format records
//!
//! Responsibilities:
//! - Resolve the reporting period from the sheet header
//! - Locate line-item sections per report family
//! - Split composite concept cells into codes and labels
//! - Reshape metric columns into one record per (line item, metric)
//! - Assign each record its load-time identity
//!
//! Pure and synchronous: no I/O happens here.

pub mod amount;
pub mod code;
pub mod error;
pub mod family;
pub mod identity;
pub mod layout;
pub mod period;
pub mod reshape;
pub mod sheet;
pub mod transform;

pub use amount::parse_amount;
pub use error::NormalizeError;
pub use family::ReportFamily;
pub use identity::{IdentityStrategy, NormalizedRecord};
pub use layout::ReportLayout;
pub use period::{resolve_period, ReportingPeriod};
pub use sheet::{Cell, RawSheet};
pub use transform::{transform, Transformed};
