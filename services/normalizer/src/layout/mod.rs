//! Report layouts: where the period lives, which rows hold line items, how
//! the concept cell splits into a code, and which columns carry metrics.
//!
//! One implementation per report family; everything downstream (reshape,
//! identity, load) is shared.

mod budget;
mod expenditure;
mod income;

pub use budget::BudgetBalanceLayout;
pub use expenditure::{DetailedExpenditureLayout, EXPENDITURE_ANCHOR_PATTERN, EXPENDITURE_SECTION_I_START};
pub use income::{DetailedIncomeLayout, FixedRegion, INCOME_HEADER_SEARCH, INCOME_REGIONS};

use crate::code::CodeSplit;
use crate::error::NormalizeError;
use crate::family::ReportFamily;
use crate::sheet::RawSheet;

/// Column holding the composite "code + description" text in every family.
pub const LABEL_COLUMN: usize = 1;

/// A metric column and the name it takes in long format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub name: &'static str,
    pub column: usize,
}

/// Rows of one report section, in sheet order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub tag: &'static str,
    pub rows: Vec<usize>,
}

impl Section {
    pub fn span(tag: &'static str, rows: std::ops::Range<usize>) -> Self {
        Self {
            tag,
            rows: rows.collect(),
        }
    }
}

pub trait ReportLayout: Send + Sync {
    fn family(&self) -> ReportFamily;

    /// Free text the reporting period is read from.
    fn period_text(&self, sheet: &RawSheet) -> String;

    /// When true, an unresolvable period fails the transform instead of
    /// falling back to the "unknown" quarter.
    fn requires_period(&self) -> bool;

    fn locate_sections(&self, sheet: &RawSheet) -> Result<Vec<Section>, NormalizeError>;

    fn split_code(&self, text: &str) -> CodeSplit;

    /// Whether rows whose concept cell yields no code survive into the output.
    fn keeps_uncoded_rows(&self) -> bool {
        false
    }

    fn metrics(&self) -> &'static [Metric];
}
