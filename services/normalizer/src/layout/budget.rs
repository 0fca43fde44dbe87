use regex::Regex;
use std::sync::LazyLock;

use super::{Metric, ReportLayout, Section, LABEL_COLUMN};
use crate::code::{split_budget_code, CodeSplit, BUDGET_CODE_PATTERN};
use crate::error::NormalizeError;
use crate::family::ReportFamily;
use crate::sheet::RawSheet;

/// Header cell carrying "al <d> de <mes> de <aaaa>".
const PERIOD_CELL: (usize, usize) = (3, 1);

const METRICS: &[Metric] = &[
    Metric { name: "estimated_or_approved", column: 2 },
    Metric { name: "devengado", column: 3 },
    Metric { name: "recaudado_pagado", column: 4 },
];

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BUDGET_CODE_PATTERN).expect("budget pattern is valid"));

/// Budget balance (F4): a single section made of every row whose concept
/// cell opens with one of the fixed budget codes, wherever it sits.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetBalanceLayout;

impl ReportLayout for BudgetBalanceLayout {
    fn family(&self) -> ReportFamily {
        ReportFamily::BudgetBalance
    }

    fn period_text(&self, sheet: &RawSheet) -> String {
        sheet.text(PERIOD_CELL.0, PERIOD_CELL.1)
    }

    fn requires_period(&self) -> bool {
        false
    }

    fn locate_sections(&self, sheet: &RawSheet) -> Result<Vec<Section>, NormalizeError> {
        let rows = (0..sheet.height())
            .filter(|&row| ROW_RE.is_match(&sheet.text(row, LABEL_COLUMN)))
            .collect();
        Ok(vec![Section { tag: "I", rows }])
    }

    fn split_code(&self, text: &str) -> CodeSplit {
        split_budget_code(text)
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::grid;

    #[test]
    fn test_rows_selected_by_code_anywhere() {
        let sheet = grid(&[
            &["", "Balance Presupuestario - LDF"],
            &["", "A. Ingresos Totales (A = A1+A2+A3)"],
            &["", "A1. Ingresos de Libre Disposición", "1", "2", "3"],
            &["", ""],
            &["", "B2. Transferencias", "4", "5", "6"],
            &["", "Total"],
            &["", "G1. Ingresos", "7", "8", "9"],
        ]);
        let sections = BudgetBalanceLayout.locate_sections(&sheet).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].tag, "I");
        assert_eq!(sections[0].rows, vec![2, 4, 6]);
    }

    #[test]
    fn test_no_matching_rows_is_empty_section() {
        let sheet = grid(&[&["", "nothing here"]]);
        let sections = BudgetBalanceLayout.locate_sections(&sheet).unwrap();
        assert!(sections[0].rows.is_empty());
    }
}
