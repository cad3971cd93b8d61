//! OutputGrid: sparse (sheet, row, column) → value map handed to the record sink.
//!
//! Rows and columns are 1-based spreadsheet coordinates: column 1 is `A`,
//! row 1 is the header row of the template.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::convert::parse_decimal;

/// Report sheets in template order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Sheet {
    Data,
    Setup,
    Reg,
    Changes,
    Params,
}

impl Sheet {
    pub const ALL: [Sheet; 5] = [
        Sheet::Data,
        Sheet::Setup,
        Sheet::Reg,
        Sheet::Changes,
        Sheet::Params,
    ];

    /// Sheet name inside the template workbook.
    pub fn name(self) -> &'static str {
        match self {
            Sheet::Data => "Data",
            Sheet::Setup => "Setup",
            Sheet::Reg => "Reg",
            Sheet::Changes => "Changes",
            Sheet::Params => "Params",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddr {
    pub sheet: Sheet,
    pub row: u32,
    pub col: u32,
}

impl CellAddr {
    pub fn new(sheet: Sheet, row: u32, col: u32) -> Self {
        Self { sheet, row, col }
    }

    /// A1-style reference, e.g. `AB12`.
    pub fn a1(&self) -> String {
        format!("{}{}", column_name(self.col), self.row)
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet.name(), self.a1())
    }
}

/// Letters for a 1-based column number (1 → `A`, 27 → `AA`).
pub fn column_name(mut col: u32) -> String {
    let mut out = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        out.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// 1-based column number for uppercase letters (`A` → 1, `AA` → 27).
pub fn column_number(name: &str) -> u32 {
    name.bytes()
        .fold(0, |acc, b| acc * 26 + u32::from(b.saturating_sub(b'A')) + 1)
}

/// A cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl CellValue {
    /// Text that reads as a number becomes that number: integer first, then
    /// decimal with `.`, then decimal with `,`.
    pub fn normalized(self) -> Self {
        match self {
            CellValue::Text(text) => {
                if let Ok(n) = text.parse::<i32>() {
                    CellValue::Integer(i64::from(n))
                } else if let Some(f) = parse_decimal(&text) {
                    CellValue::Float(f)
                } else {
                    CellValue::Text(text)
                }
            }
            other => other,
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Integer(v)
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_owned())
    }
}

/// Sparse cell map. A later write to the same cell replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputGrid {
    cells: BTreeMap<CellAddr, CellValue>,
}

impl OutputGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, sheet: Sheet, row: u32, col: u32, value: impl Into<CellValue>) {
        self.cells
            .insert(CellAddr::new(sheet, row, col), value.into());
    }

    /// Write `values` down one column starting at `first_row`.
    pub fn set_column<V, I>(&mut self, sheet: Sheet, col: u32, first_row: u32, values: I)
    where
        V: Into<CellValue>,
        I: IntoIterator<Item = V>,
    {
        for (row, value) in (first_row..).zip(values) {
            self.set(sheet, row, col, value);
        }
    }

    pub fn get(&self, sheet: Sheet, row: u32, col: u32) -> Option<&CellValue> {
        self.cells.get(&CellAddr::new(sheet, row, col))
    }

    /// Numeric value of a cell, if it holds a number.
    pub fn number(&self, sheet: Sheet, row: u32, col: u32) -> Option<f64> {
        match self.get(sheet, row, col)? {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(v) => Some(*v as f64),
            CellValue::Text(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellAddr, &CellValue)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names() {
        assert_eq!(column_name(1), "A");
        assert_eq!(column_name(26), "Z");
        assert_eq!(column_name(27), "AA");
        assert_eq!(column_name(60), "BH");
        assert_eq!(column_name(703), "AAA");
        for col in 1..800 {
            assert_eq!(column_number(&column_name(col)), col);
        }
    }

    #[test]
    fn a1_reference() {
        let addr = CellAddr::new(Sheet::Setup, 29, 2);
        assert_eq!(addr.a1(), "B29");
        assert_eq!(addr.to_string(), "Setup!B29");
    }

    #[test]
    fn numeric_text_normalizes() {
        assert_eq!(CellValue::from("12345").normalized(), CellValue::Integer(12345));
        assert_eq!(CellValue::from("1.25").normalized(), CellValue::Float(1.25));
        assert_eq!(CellValue::from("1,25").normalized(), CellValue::Float(1.25));
        assert_eq!(CellValue::from("220 B").normalized(), CellValue::from("220 B"));
        assert_eq!(CellValue::from("").normalized(), CellValue::from(""));
        assert_eq!(CellValue::from("nan").normalized(), CellValue::from("nan"));
        assert_eq!(CellValue::Float(2.0).normalized(), CellValue::Float(2.0));
    }

    #[test]
    fn later_write_wins() {
        let mut grid = OutputGrid::new();
        grid.set(Sheet::Data, 2, 1, 1.0);
        grid.set(Sheet::Data, 2, 1, "x");
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.get(Sheet::Data, 2, 1), Some(&CellValue::from("x")));
    }

    #[test]
    fn set_column_walks_rows() {
        let mut grid = OutputGrid::new();
        grid.set_column(Sheet::Data, 3, 2, [1.0, 2.0, 3.0]);
        assert_eq!(grid.number(Sheet::Data, 4, 3), Some(3.0));
        assert_eq!(grid.get(Sheet::Data, 5, 3), None);
    }
}
