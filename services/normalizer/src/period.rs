//! Reporting period resolution from Spanish free-text headers such as
//! "Del 1 de enero al 31 de marzo de 2023 (b)".

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Sentinel quarter label when the header text carries no recognizable date.
pub const UNKNOWN_QUARTER: &str = "unknown";

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let months = MONTHS.join("|");
    Regex::new(&format!(r"(?i)\b(\d{{1,2}}) de ({months})(?: de)? (\d{{4}})\b"))
        .expect("date pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportingPeriod {
    /// ISO "YYYY-MM-DD"; `None` when the header did not match.
    pub full_date: Option<String>,
    /// "<year>_Q<n>" or `UNKNOWN_QUARTER`.
    pub year_quarter: String,
}

impl ReportingPeriod {
    pub fn unknown() -> Self {
        Self {
            full_date: None,
            year_quarter: UNKNOWN_QUARTER.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.full_date.is_some()
    }
}

/// Resolve the period end-date from header text.
///
/// The last "<day> de <month> de <year>" occurrence wins, so a range such as
/// "del 1 de enero al 31 de marzo de 2023" resolves to its end date. This
/// differs from a first-match search, which would return the range start.
/// Only the last occurrence is validated: if its day is outside 1..=31 the
/// period is unknown, even when an earlier occurrence is well formed. Dates are not checked against the calendar ("31 de
/// febrero" is accepted).
pub fn resolve_period(text: &str) -> ReportingPeriod {
    let Some(caps) = DATE_RE.captures_iter(text).last() else {
        return ReportingPeriod::unknown();
    };

    let day: u32 = caps[1].parse().unwrap_or(0);
    let year: u32 = caps[3].parse().unwrap_or(0);
    let month_name = caps[2].to_lowercase();
    let month = MONTHS
        .iter()
        .position(|m| *m == month_name)
        .map(|i| i as u32 + 1)
        .unwrap_or(0);

    if !(1..=31).contains(&day) || month == 0 {
        return ReportingPeriod::unknown();
    }

    let quarter = (month - 1) / 3 + 1;
    ReportingPeriod {
        full_date: Some(format!("{year:04}-{month:02}-{day:02}")),
        year_quarter: format!("{year}_Q{quarter}"),
    }
}
