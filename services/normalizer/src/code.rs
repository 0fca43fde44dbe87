//! Code/label splitting for the composite "code + description" concept cell.
//!
//! Each family numbers its line items differently:
//! - budget balance: a closed set such as "A1.", "B2.", "G1."
//! - detailed expenditure: a letter and digits closed by a parenthesis, "a1)"
//! - detailed income: an upper-case heading key "A." or a lower-case item key "a1)"

use regex::Regex;
use std::sync::LazyLock;

/// Budget-balance code grammar; also used to select line-item rows.
pub const BUDGET_CODE_PATTERN: &str = r"^(A[123]|B[12]|C[12]|E[12]|F[12]|G[12])\.";

static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{BUDGET_CODE_PATTERN}\s*(.*)")).expect("budget pattern is valid")
});
static EXPENDITURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z])([0-9]+)\)\s*(.*)").expect("expenditure pattern is valid"));
static INCOME_PRIMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]\.)\s*(.*)").expect("income primary pattern is valid"));
static INCOME_SECONDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]\d+\))\s*(.*)").expect("income secondary pattern is valid"));

/// Result of splitting one concept cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodeSplit {
    pub code: Option<String>,
    /// Only the income grammar records a second, independent key.
    pub secondary_code: Option<String>,
    pub label: String,
}

impl CodeSplit {
    fn unmatched(text: &str) -> Self {
        Self {
            code: None,
            secondary_code: None,
            label: text.to_string(),
        }
    }

    pub fn has_code(&self) -> bool {
        self.code.is_some() || self.secondary_code.is_some()
    }
}

/// "A1. Ingresos de Libre Disposición" -> ("A1", "Ingresos de Libre Disposición").
pub fn split_budget_code(text: &str) -> CodeSplit {
    match BUDGET_RE.captures(text) {
        Some(caps) => CodeSplit {
            code: Some(caps[1].to_string()),
            secondary_code: None,
            label: caps[2].trim().to_string(),
        },
        None => CodeSplit::unmatched(text),
    }
}

/// "  a1) Remuneraciones al Personal" -> ("A1", "Remuneraciones al Personal").
pub fn split_expenditure_code(text: &str) -> CodeSplit {
    match EXPENDITURE_RE.captures(text) {
        Some(caps) => CodeSplit {
            code: Some(format!("{}{}", caps[1].to_uppercase(), &caps[2])),
            secondary_code: None,
            label: caps[3].trim().to_string(),
        },
        None => CodeSplit::unmatched(text),
    }
}

/// Income rows carry either a heading key "A." or an item key "a1)".
///
/// Both patterns are tried independently; a row with neither keeps its
/// whole text as the label and null codes.
pub fn split_income_code(text: &str) -> CodeSplit {
    let primary = INCOME_PRIMARY_RE.captures(text);
    let secondary = INCOME_SECONDARY_RE.captures(text);

    let label = primary
        .as_ref()
        .or(secondary.as_ref())
        .map(|caps| caps[2].trim().to_string())
        .unwrap_or_else(|| text.trim().to_string());

    CodeSplit {
        code: primary.as_ref().map(|caps| caps[1].to_string()),
        secondary_code: secondary.as_ref().map(|caps| caps[1].to_string()),
        label,
    }
}
