use regex::Regex;
use std::sync::LazyLock;

use super::{Metric, ReportLayout, Section, LABEL_COLUMN};
use crate::code::{split_expenditure_code, CodeSplit};
use crate::error::NormalizeError;
use crate::family::ReportFamily;
use crate::sheet::RawSheet;

/// Row separating non-earmarked (I) from earmarked (II) spending.
pub const EXPENDITURE_ANCHOR_PATTERN: &str = r"^\s*II\.\s*Gasto Etiquetado";

/// First row of section I, right below the column headers.
pub const EXPENDITURE_SECTION_I_START: usize = 8;

const PERIOD_CELL: (usize, usize) = (4, 1);

const METRICS: &[Metric] = &[
    Metric { name: "aprobado", column: 2 },
    Metric { name: "ampliaciones_reducciones", column: 3 },
    Metric { name: "modificado", column: 4 },
    Metric { name: "devengado", column: 5 },
    Metric { name: "pagado", column: 6 },
    Metric { name: "subejercicio", column: 7 },
];

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EXPENDITURE_ANCHOR_PATTERN).expect("anchor pattern is valid"));

/// Detailed expenditure by object of spending (F6a).
///
/// Section I runs from a fixed offset to the "II. Gasto Etiquetado" anchor;
/// section II runs from below the anchor to the first blank concept cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailedExpenditureLayout;

impl ReportLayout for DetailedExpenditureLayout {
    fn family(&self) -> ReportFamily {
        ReportFamily::DetailedExpenditure
    }

    fn period_text(&self, sheet: &RawSheet) -> String {
        sheet.text(PERIOD_CELL.0, PERIOD_CELL.1)
    }

    fn requires_period(&self) -> bool {
        true
    }

    fn locate_sections(&self, sheet: &RawSheet) -> Result<Vec<Section>, NormalizeError> {
        let anchor = sheet
            .find_row(LABEL_COLUMN, 0, |cell| ANCHOR_RE.is_match(&cell.text()))
            .ok_or_else(|| {
                NormalizeError::structural(self.family(), "header 'II. Gasto Etiquetado' not found")
            })?;

        if anchor < EXPENDITURE_SECTION_I_START {
            return Err(NormalizeError::structural(
                self.family(),
                format!(
                    "'II. Gasto Etiquetado' found at row {} above section I start row {}",
                    anchor, EXPENDITURE_SECTION_I_START
                ),
            ));
        }

        let section_ii_start = anchor + 1;
        let section_ii_end = sheet
            .find_row(LABEL_COLUMN, section_ii_start, |cell| cell.is_blank())
            .unwrap_or(sheet.height());

        Ok(vec![
            Section::span("I", EXPENDITURE_SECTION_I_START..anchor),
            Section::span("II", section_ii_start..section_ii_end),
        ])
    }

    fn split_code(&self, text: &str) -> CodeSplit {
        split_expenditure_code(text)
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }
}
