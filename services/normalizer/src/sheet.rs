//! Positional worksheet grid.
//!
//! A `RawSheet` carries no header row and no schema: every report layout
//! addresses cells by absolute (row, column) as they appear in the workbook.

use std::fmt;

/// One untyped worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

static EMPTY: Cell = Cell::Empty;

impl Cell {
    /// Text cells that are whitespace-only count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Stringified cell value; blank cells become the empty string.
    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => {
                // Whole numbers print without a trailing ".0"
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// A single worksheet read without headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Number of rows, including leading and trailing blank rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(Cell::is_blank))
    }

    /// Cell at (row, col); anything outside the grid reads as `Cell::Empty`.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn text(&self, row: usize, col: usize) -> String {
        self.cell(row, col).text()
    }

    /// Column-1-style lookup: first row at or after `from` whose cell in
    /// `col` satisfies the predicate.
    pub fn find_row<F>(&self, col: usize, from: usize, mut pred: F) -> Option<usize>
    where
        F: FnMut(&Cell) -> bool,
    {
        (from..self.height()).find(|&row| pred(self.cell(row, col)))
    }
}

#[cfg(test)]
pub(crate) fn grid(rows: &[&[&str]]) -> RawSheet {
    let rows = rows
        .iter()
        .map(|r| r.iter().map(|s| Cell::from(*s)).collect())
        .collect();
    RawSheet::new("test", rows)
}
