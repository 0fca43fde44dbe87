//! Workbook decoding: xlsx bytes into a `RawSheet` grid.

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use normalizer::{Cell, RawSheet};
use std::io::Cursor;

use crate::error::SourceError;

/// Read one named sheet. Row and column indices in the result are absolute
/// sheet positions, even when the used range starts below A1.
pub fn read_sheet(bytes: &[u8], sheet_name: &str) -> Result<RawSheet, SourceError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| SourceError::Workbook(format!("failed to open workbook: {}", e)))?;

    if !workbook.sheet_names().iter().any(|n| n == sheet_name) {
        return Err(SourceError::MissingSheet(sheet_name.to_string()));
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| SourceError::Workbook(format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    Ok(RawSheet::new(sheet_name, range_to_rows(&range)))
}

fn range_to_rows(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(data_to_cell));
        rows.push(cells);
    }
    rows
}

pub fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}
