//! A1-style cell address parsing shared by the reader and the extraction config

use crate::error::{PickError, PickResult};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Number of rows in an OOXML worksheet
pub const MAX_ROWS: u32 = 1_048_576;
/// Number of columns in an OOXML worksheet (`A..XFD`)
pub const MAX_COLS: u32 = 16_384;

static CELL_REF: OnceLock<Regex> = OnceLock::new();
static COLUMN_REF: OnceLock<Regex> = OnceLock::new();

fn cell_ref_regex() -> &'static Regex {
    CELL_REF.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([0-9]{1,7})$").unwrap())
}

fn column_ref_regex() -> &'static Regex {
    COLUMN_REF.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})$").unwrap())
}

/// A 0-based cell position parsed from labels such as `B4` or `$C$27`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1 label, rejecting anything outside the worksheet grid
    pub fn parse(label: &str) -> PickResult<Self> {
        let caps = cell_ref_regex()
            .captures(label.trim())
            .ok_or_else(|| PickError::InvalidAddress(label.to_string()))?;

        let col = letters_to_column(&caps[1])
            .ok_or_else(|| PickError::InvalidAddress(label.to_string()))?;
        let row: u32 = caps[2]
            .parse()
            .map_err(|_| PickError::InvalidAddress(label.to_string()))?;

        if row == 0 || row > MAX_ROWS {
            return Err(PickError::InvalidAddress(label.to_string()));
        }

        Ok(Self { row: row - 1, col })
    }

    /// Same row, `delta` columns to the right (or left when negative)
    pub fn offset_col(&self, delta: i32) -> Option<Self> {
        let col = i64::from(self.col) + i64::from(delta);
        if (0..i64::from(MAX_COLS)).contains(&col) {
            Some(Self {
                row: self.row,
                col: col as u32,
            })
        } else {
            None
        }
    }

    /// Convert to Excel-style reference (e.g., "A1")
    pub fn to_a1(&self) -> String {
        format!("{}{}", column_to_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellAddress {
    type Err = PickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

/// Parse a bare column label like "A" or "AB" into a 0-based index
pub fn parse_column(label: &str) -> PickResult<u32> {
    column_ref_regex()
        .captures(label.trim())
        .and_then(|caps| letters_to_column(&caps[1]))
        .ok_or_else(|| PickError::InvalidAddress(label.to_string()))
}

fn letters_to_column(letters: &str) -> Option<u32> {
    let mut col = 0u32;
    for ch in letters.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    if col == 0 || col > MAX_COLS {
        return None;
    }
    Some(col - 1)
}

/// Convert column number to letters (0 -> A, 1 -> B, 26 -> AA)
pub fn column_to_letters(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}
