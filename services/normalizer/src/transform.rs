use crate::error::NormalizeError;
use crate::family::ReportFamily;
use crate::identity::{assign_identities, IdentityStrategy, NormalizedRecord};
use crate::period::{resolve_period, ReportingPeriod};
use crate::reshape::{collect_line_items, reshape};
use crate::sheet::RawSheet;

/// Output of one sheet's transform.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub family: ReportFamily,
    pub period: ReportingPeriod,
    pub line_items: usize,
    pub records: Vec<NormalizedRecord>,
}

/// Normalize one worksheet of the given family into keyed long records.
///
/// This function is deterministic under `IdentityStrategy::Deterministic`:
/// the same sheet and source name always produce the same records.
pub fn transform(
    family: ReportFamily,
    sheet: &RawSheet,
    source_file: &str,
    strategy: IdentityStrategy,
) -> Result<Transformed, NormalizeError> {
    let layout = family.layout();

    let period_text = layout.period_text(sheet);
    let period = resolve_period(&period_text);
    if !period.is_known() {
        if layout.requires_period() {
            return Err(NormalizeError::structural(
                family,
                format!("no reporting period in header text '{}'", period_text.trim()),
            ));
        }
        tracing::warn!(%family, source_file, "reporting period not found, using '{}'", period.year_quarter);
    }

    let sections = layout.locate_sections(sheet)?;

    let mut line_items = 0;
    let mut rows = Vec::new();
    for section in &sections {
        let items = collect_line_items(layout, sheet, section);
        tracing::debug!(
            %family,
            section = section.tag,
            candidate_rows = section.rows.len(),
            line_items = items.len(),
            "section extracted"
        );
        line_items += items.len();
        rows.extend(reshape(family, &items, &period, source_file));
    }

    let records = assign_identities(rows, strategy);
    tracing::info!(
        %family,
        source_file,
        year_quarter = %period.year_quarter,
        line_items,
        records = records.len(),
        "sheet normalized"
    );

    Ok(Transformed {
        family,
        period,
        line_items,
        records,
    })
}
