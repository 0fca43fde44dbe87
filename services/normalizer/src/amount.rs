use crate::sheet::Cell;

/// Parse a monetary cell in the source locale ("1,000", "$2,000.50").
///
/// Thousands separators, the dollar sign and whitespace are stripped before
/// parsing. Anything that still fails to parse becomes `None`.
pub fn parse_amount(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => parse_amount_str(s),
        _ => None,
    }
}

pub fn parse_amount_str(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
