//! Workbook data structures (computed-values view)

use super::address::CellAddress;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Represents a complete workbook, sheets in tab order
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Get a sheet by name
    pub fn get_sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Why a single cell read could not produce a usable value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CellReadError {
    #[error("cell {0} lies outside the sheet's used range")]
    OutOfRange(CellAddress),
    #[error("cell {address} holds {found}, expected {expected}")]
    TypeMismatch {
        address: CellAddress,
        expected: &'static str,
        found: &'static str,
    },
}

/// Represents a worksheet
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub cells: HashMap<(u32, u32), Cell>,
    pub used_range: Option<(u32, u32)>, // (rows, cols)
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: HashMap::new(),
            used_range: None,
        }
    }

    /// Insert a value, growing the used range to cover it
    pub fn set_value(&mut self, address: CellAddress, value: CellValue) {
        let (rows, cols) = self.used_range.unwrap_or((0, 0));
        self.used_range = Some((rows.max(address.row + 1), cols.max(address.col + 1)));
        self.cells.insert(
            (address.row, address.col),
            Cell {
                row: address.row,
                col: address.col,
                value,
            },
        );
    }

    /// Get a cell at the given position
    pub fn get_cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Read the value at `address`.
    ///
    /// Positions inside the used range without a stored cell read as
    /// [`CellValue::Empty`]; positions past it are [`CellReadError::OutOfRange`].
    pub fn read(&self, address: CellAddress) -> Result<&CellValue, CellReadError> {
        match self.used_range {
            Some((rows, cols)) if address.row < rows && address.col < cols => Ok(self
                .get_cell(address.row, address.col)
                .map(|c| &c.value)
                .unwrap_or(&CellValue::Empty)),
            _ => Err(CellReadError::OutOfRange(address)),
        }
    }

    /// Non-empty cells in a specific column, top to bottom
    pub fn column_cells(&self, col: u32) -> Vec<&Cell> {
        let mut cells: Vec<&Cell> = self
            .cells
            .values()
            .filter(|c| c.col == col && !c.value.is_empty())
            .collect();
        cells.sort_by_key(|c| c.row);
        cells
    }
}

/// Represents a single cell
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
}

impl Cell {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

/// Cell value types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Excel serial date/time
    DateTime(f64),
    Error(String),
}

impl CellValue {
    /// Check if the cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "nothing",
            CellValue::Number(_) => "a number",
            CellValue::Text(_) => "text",
            CellValue::Boolean(_) => "a boolean",
            CellValue::DateTime(_) => "a date",
            CellValue::Error(_) => "an error value",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::DateTime(serial) => write!(f, "{serial}"),
            CellValue::Error(e) => write!(f, "{e}"),
        }
    }
}
