//! Parsing of the CSV list of wanted sheet names

use crate::error::{PickError, PickResult};

/// Header of the single required column
pub const SHEET_NAME_COLUMN: &str = "SheetName";

const UTF8_BOM: &str = "\u{feff}";

/// Read the wanted sheet names from CSV bytes.
///
/// Values are trimmed and blanks dropped; order and duplicates are kept.
pub fn parse_wanted_sheets(csv_bytes: &[u8]) -> PickResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_bytes);

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.strip_prefix(UTF8_BOM).unwrap_or(h) == SHEET_NAME_COLUMN)
        .ok_or_else(|| PickError::MissingColumn(SHEET_NAME_COLUMN.to_string()))?;

    let mut wanted = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(name) = record.get(column).map(str::trim) {
            if !name.is_empty() {
                wanted.push(name.to_string());
            }
        }
    }

    if wanted.is_empty() {
        return Err(PickError::EmptySelection);
    }

    tracing::debug!(count = wanted.len(), "parsed wanted sheet names");
    Ok(wanted)
}
