//! Line-item collection and the wide-to-long reshape.

use serde::Serialize;
use std::collections::HashSet;

use crate::amount::parse_amount;
use crate::family::ReportFamily;
use crate::layout::{Metric, ReportLayout, Section, LABEL_COLUMN};
use crate::period::{ReportingPeriod, UNKNOWN_QUARTER};
use crate::sheet::{Cell, RawSheet};

/// One report line (a row of the source sheet) before reshaping.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub section: &'static str,
    pub code: Option<String>,
    pub secondary_code: Option<String>,
    pub label: String,
    pub source_row: usize,
    pub values: Vec<(Metric, Cell)>,
}

impl LineItem {
    /// Uniqueness key within a section: the codes, or the label when the
    /// row carries no code at all.
    fn dedup_key(&self) -> (Option<String>, Option<String>, Option<String>) {
        let label = if self.code.is_none() && self.secondary_code.is_none() {
            Some(self.label.clone())
        } else {
            None
        };
        (self.code.clone(), self.secondary_code.clone(), label)
    }
}

/// Pull line items out of one section.
///
/// Rows whose concept cell yields no code are dropped unless the layout keeps
/// uncoded rows; rows with a blank concept cell are always dropped. The first
/// occurrence of a code wins; later duplicates in the section are ignored.
pub fn collect_line_items(layout: &dyn ReportLayout, sheet: &RawSheet, section: &Section) -> Vec<LineItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for &row in &section.rows {
        let concept = sheet.cell(row, LABEL_COLUMN);
        if concept.is_blank() {
            continue;
        }

        let split = layout.split_code(&concept.text());
        if !split.has_code() && !layout.keeps_uncoded_rows() {
            continue;
        }

        let item = LineItem {
            section: section.tag,
            code: split.code,
            secondary_code: split.secondary_code,
            label: split.label,
            source_row: row,
            values: layout
                .metrics()
                .iter()
                .map(|m| (*m, sheet.cell(row, m.column).clone()))
                .collect(),
        };

        if !seen.insert(item.dedup_key()) {
            tracing::debug!(
                section = section.tag,
                row,
                code = ?item.code,
                "dropping duplicate line item"
            );
            continue;
        }
        items.push(item);
    }

    items
}

/// A long-format row awaiting its identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRow {
    pub family: ReportFamily,
    pub code: Option<String>,
    pub secondary_code: Option<String>,
    pub label: String,
    pub metric: String,
    pub amount: Option<f64>,
    pub full_date: Option<String>,
    pub year_quarter: String,
    pub section: String,
    pub source_file: String,
    pub source_row: usize,
}

impl LongRow {
    /// Natural key of the row: family, period, section, codes and metric.
    ///
    /// The label only takes part when the row has no code. When the period
    /// could not be resolved the source file stands in for it so separate
    /// files never share keys.
    pub fn natural_key(&self) -> String {
        let period = if self.year_quarter == UNKNOWN_QUARTER {
            self.source_file.as_str()
        } else {
            self.year_quarter.as_str()
        };
        let label = if self.code.is_none() && self.secondary_code.is_none() {
            self.label.as_str()
        } else {
            ""
        };
        [
            self.family.slug(),
            period,
            self.section.as_str(),
            self.code.as_deref().unwrap_or(""),
            self.secondary_code.as_deref().unwrap_or(""),
            label,
            self.metric.as_str(),
        ]
        .join("|")
    }
}

/// Melt line items into one row per (line item, metric), keeping row order
/// and then metric order.
pub fn reshape(
    family: ReportFamily,
    items: &[LineItem],
    period: &ReportingPeriod,
    source_file: &str,
) -> Vec<LongRow> {
    items
        .iter()
        .flat_map(|item| {
            item.values.iter().map(move |(metric, cell)| LongRow {
                family,
                code: item.code.clone(),
                secondary_code: item.secondary_code.clone(),
                label: item.label.clone(),
                metric: metric.name.to_string(),
                amount: parse_amount(cell),
                full_date: period.full_date.clone(),
                year_quarter: period.year_quarter.clone(),
                section: item.section.to_string(),
                source_file: source_file.to_string(),
                source_row: item.source_row,
            })
        })
        .collect()
}
