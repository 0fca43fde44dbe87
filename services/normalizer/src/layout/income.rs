use std::ops::Range;

use super::{Metric, ReportLayout, Section, LABEL_COLUMN};
use crate::code::{split_income_code, CodeSplit};
use crate::error::NormalizeError;
use crate::family::ReportFamily;
use crate::sheet::RawSheet;

/// A hard-wired block of rows in the published template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRegion {
    pub tag: &'static str,
    pub rows: Range<usize>,
}

/// Section I covers non-earmarked income, section II federal earmarked
/// transfers. The template has no anchor row for either.
pub const INCOME_REGIONS: [FixedRegion; 2] = [
    FixedRegion { tag: "I", rows: 7..44 },
    FixedRegion { tag: "II", rows: 45..76 },
];

/// Rows (above section I) where the "Concepto" column header must appear.
/// The header is a merged cell in some editions, so its row varies.
pub const INCOME_HEADER_SEARCH: Range<usize> = 4..7;

const PERIOD_ROW: usize = 3;
const PERIOD_COLUMNS: Range<usize> = 1..8;

const METRICS: &[Metric] = &[
    Metric { name: "estimado", column: 2 },
    Metric { name: "ampliaciones_reducciones", column: 3 },
    Metric { name: "modificado", column: 4 },
    Metric { name: "devengado", column: 5 },
    Metric { name: "recaudado", column: 6 },
    Metric { name: "diferencia", column: 7 },
];

/// Detailed income statement (F5): two fixed row ranges, validated at the
/// boundaries so a shifted template fails loudly instead of loading the
/// wrong rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailedIncomeLayout;

impl DetailedIncomeLayout {
    fn validate(&self, sheet: &RawSheet) -> Result<(), NormalizeError> {
        let header_found = INCOME_HEADER_SEARCH
            .clone()
            .any(|row| sheet.text(row, LABEL_COLUMN).to_lowercase().contains("concepto"));
        if !header_found {
            return Err(NormalizeError::structural(
                self.family(),
                format!(
                    "'Concepto' column header not found in rows {}..{}",
                    INCOME_HEADER_SEARCH.start, INCOME_HEADER_SEARCH.end
                ),
            ));
        }

        for region in &INCOME_REGIONS {
            if sheet.height() <= region.rows.start {
                return Err(NormalizeError::structural(
                    self.family(),
                    format!(
                        "section {} expected at rows {}..{} but sheet has {} rows",
                        region.tag,
                        region.rows.start,
                        region.rows.end,
                        sheet.height()
                    ),
                ));
            }
            if sheet.cell(region.rows.start, LABEL_COLUMN).is_blank() {
                return Err(NormalizeError::structural(
                    self.family(),
                    format!(
                        "section {} boundary row {} has no concept text",
                        region.tag, region.rows.start
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl ReportLayout for DetailedIncomeLayout {
    fn family(&self) -> ReportFamily {
        ReportFamily::DetailedIncome
    }

    fn period_text(&self, sheet: &RawSheet) -> String {
        PERIOD_COLUMNS
            .map(|col| sheet.text(PERIOD_ROW, col).trim().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn requires_period(&self) -> bool {
        true
    }

    fn locate_sections(&self, sheet: &RawSheet) -> Result<Vec<Section>, NormalizeError> {
        self.validate(sheet)?;
        Ok(INCOME_REGIONS
            .iter()
            .map(|region| {
                let end = region.rows.end.min(sheet.height());
                Section::span(region.tag, region.rows.start..end)
            })
            .collect())
    }

    fn split_code(&self, text: &str) -> CodeSplit {
        split_income_code(text)
    }

    fn keeps_uncoded_rows(&self) -> bool {
        true
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }
}
