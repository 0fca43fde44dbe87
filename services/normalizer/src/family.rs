//! The three quarterly report families and their fixed publication metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NormalizeError;
use crate::layout::{BudgetBalanceLayout, DetailedExpenditureLayout, DetailedIncomeLayout, ReportLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportFamily {
    #[serde(rename = "balance_presupuestario")]
    BudgetBalance,
    #[serde(rename = "egresos_detallado")]
    DetailedExpenditure,
    #[serde(rename = "ingresos_detallado")]
    DetailedIncome,
}

impl ReportFamily {
    pub const ALL: [ReportFamily; 3] = [
        ReportFamily::BudgetBalance,
        ReportFamily::DetailedExpenditure,
        ReportFamily::DetailedIncome,
    ];

    /// Short slug used in pipeline names and on the command line.
    pub fn slug(&self) -> &'static str {
        match self {
            ReportFamily::BudgetBalance => "balance_presupuestario",
            ReportFamily::DetailedExpenditure => "egresos_detallado",
            ReportFamily::DetailedIncome => "ingresos_detallado",
        }
    }

    /// File name prefix before the `<N>T<YYYY>.xlsx` period suffix.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ReportFamily::BudgetBalance => "F4_Balance_Presupuestario_LDF_",
            ReportFamily::DetailedExpenditure => "F6_a_EAPED_Clas_Obj_Gas_LDF_",
            ReportFamily::DetailedIncome => "F5_Edo_Ana_Ing_Det_LDF_",
        }
    }

    /// Worksheet holding the report inside each workbook.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            ReportFamily::BudgetBalance => "F4 BAP",
            ReportFamily::DetailedExpenditure => "F6a COG",
            ReportFamily::DetailedIncome => "F5 EAI",
        }
    }

    /// Storage prefix the raw workbooks are published under.
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            ReportFamily::BudgetBalance => "finanzas/Balance_Presupuestario/raw/",
            ReportFamily::DetailedExpenditure => "finanzas/Egresos_Detallado/raw/",
            ReportFamily::DetailedIncome => "finanzas/Ingresos_Detallado/raw/",
        }
    }

    /// Destination table for the normalized records.
    pub fn table_name(&self) -> &'static str {
        match self {
            ReportFamily::BudgetBalance => "nuevo_leon_balance_presupuestario",
            ReportFamily::DetailedExpenditure => "nuevo_leon_egresos_detallado",
            ReportFamily::DetailedIncome => "nuevo_leon_ingresos_detallado",
        }
    }

    pub fn layout(&self) -> &'static dyn ReportLayout {
        match self {
            ReportFamily::BudgetBalance => &BudgetBalanceLayout,
            ReportFamily::DetailedExpenditure => &DetailedExpenditureLayout,
            ReportFamily::DetailedIncome => &DetailedIncomeLayout,
        }
    }
}

impl fmt::Display for ReportFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ReportFamily {
    type Err = NormalizeError;

    /// Accepts the slug, its short form, or the English family name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "balance_presupuestario" | "balance" | "budget_balance" => Ok(ReportFamily::BudgetBalance),
            "egresos_detallado" | "egresos" | "detailed_expenditure" | "expenditure" => {
                Ok(ReportFamily::DetailedExpenditure)
            }
            "ingresos_detallado" | "ingresos" | "detailed_income" | "income" => {
                Ok(ReportFamily::DetailedIncome)
            }
            other => Err(NormalizeError::UnknownFamily(other.to_string())),
        }
    }
}
