//! Published file naming: `<ReportCode>_<FamilyTag>_<N>T<YYYY>.xlsx`.

use normalizer::ReportFamily;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// A (year, quarter) pair taken from a file name. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeriodKey {
    pub year: i32,
    pub quarter: u8,
}

impl PeriodKey {
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_Q{}", self.year, self.quarter)
    }
}

/// Accepts "Q3", "3T" or "3".
pub fn parse_quarter(s: &str) -> Option<u8> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_start_matches('Q').trim_end_matches('T');
    digits.parse::<u8>().ok().filter(|q| (1..=4).contains(q))
}

pub fn file_name(family: ReportFamily, period: PeriodKey) -> String {
    format!("{}{}T{}.xlsx", family.file_prefix(), period.quarter, period.year)
}

pub fn object_key(family: ReportFamily, period: PeriodKey) -> String {
    format!("{}{}", family.storage_prefix(), file_name(family, period))
}

/// Period encoded in a file name (or object key) of the given family.
pub fn parse_file_name(family: ReportFamily, name: &str) -> Option<PeriodKey> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let pattern = format!(r"^{}([1-4])T(\d{{4}})\.xlsx$", regex::escape(family.file_prefix()));
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(base)?;
    let quarter: u8 = caps[1].parse().ok()?;
    let year: i32 = caps[2].parse().ok()?;
    PeriodKey::new(year, quarter)
}

/// Sorted, de-duplicated periods found among object keys.
pub fn periods_in<'a, I>(family: ReportFamily, keys: I) -> Vec<PeriodKey>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut periods: Vec<PeriodKey> = keys
        .into_iter()
        .filter_map(|k| parse_file_name(family, k))
        .collect();
    periods.sort();
    periods.dedup();
    periods
}
