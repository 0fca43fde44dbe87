use thiserror::Error;

use crate::family::ReportFamily;

/// Failures raised while turning a worksheet into normalized records.
///
/// Amount cells that fail to parse are not errors; they become `None`.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// An expected anchor row, header cell or fixed range is missing.
    #[error("structural mismatch in {family} sheet: {detail}")]
    StructuralMismatch {
        family: ReportFamily,
        detail: String,
    },

    #[error("unknown report family '{0}'")]
    UnknownFamily(String),
}

impl NormalizeError {
    pub fn structural(family: ReportFamily, detail: impl Into<String>) -> Self {
        NormalizeError::StructuralMismatch {
            family,
            detail: detail.into(),
        }
    }
}
