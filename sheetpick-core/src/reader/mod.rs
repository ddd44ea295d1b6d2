//! Excel file reader.
//!
//! Two views of the same bytes are needed: the package structure (sheet
//! parts and relationships, via [`package`]) for filtering, and cached
//! formula results (via calamine) for summary extraction.

use crate::error::PickResult;
use calamine::{Data, Range, Reader, Xlsx, open_workbook_from_rs};
use std::io::Cursor;

pub mod address;
pub mod package;
pub mod workbook;

pub use address::CellAddress;
pub use package::{SheetEntry, read_sheet_entries};
pub use workbook::{Cell, CellReadError, CellValue, Sheet, Workbook};

/// Read the named sheets of a workbook with formulas resolved to their last
/// calculated value
pub fn read_computed_values(bytes: &[u8], sheet_names: &[String]) -> PickResult<Workbook> {
    let mut excel: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = excel.worksheet_range(name)?;
        sheets.push(parse_sheet(name, &range));
    }

    Ok(Workbook { sheets })
}

fn parse_sheet(name: &str, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(name);

    // calamine ranges start at the first used cell, not at A1
    let (start_row, start_col) = match range.start() {
        Some(start) => start,
        None => return sheet,
    };

    for (rel_row, rel_col, data) in range.used_cells() {
        let value = parse_cell_value(data);
        if value.is_empty() {
            continue;
        }
        let address = CellAddress::new(start_row + rel_row as u32, start_col + rel_col as u32);
        sheet.set_value(address, value);
    }

    if let Some((end_row, end_col)) = range.end() {
        let (rows, cols) = sheet.used_range.unwrap_or((0, 0));
        sheet.used_range = Some((rows.max(end_row + 1), cols.max(end_col + 1)));
    }

    sheet
}

fn parse_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
        Data::Empty => CellValue::Empty,
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
