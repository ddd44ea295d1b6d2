//! Writer module: filtered workbook packages and summary workbooks

mod summary_writer;
mod xlsx_writer;

pub use summary_writer::{SUMMARY_FILE_NAME, SUMMARY_SHEET_NAME, write_summary_xlsx};
pub use xlsx_writer::{WorkbookModifications, modify_workbook_xlsx};

use crate::error::{PickError, PickResult};
use crate::reader::SheetEntry;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// File stem of the filtered workbook
pub const FILTERED_STEM: &str = "SelectedSheets";

/// Workbook flavour, decided by the source file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// `.xlsx`
    Standard,
    /// `.xlsm`
    MacroEnabled,
}

impl SourceFormat {
    pub fn from_file_name(file_name: &str) -> PickResult<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("xlsx") => Ok(SourceFormat::Standard),
            Some("xlsm") => Ok(SourceFormat::MacroEnabled),
            _ => Err(PickError::UnsupportedFormat(file_name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Standard => "xlsx",
            SourceFormat::MacroEnabled => "xlsm",
        }
    }

    pub fn keeps_macros(&self) -> bool {
        matches!(self, SourceFormat::MacroEnabled)
    }

    /// `SelectedSheets.xlsx` or `SelectedSheets.xlsm`
    pub fn filtered_file_name(&self) -> String {
        format!("{}.{}", FILTERED_STEM, self.extension())
    }
}

/// Produce a package holding only the sheets in `keep`, in their original order
pub fn filter_workbook(
    bytes: &[u8],
    sheets: &[SheetEntry],
    keep: &HashSet<&str>,
    format: SourceFormat,
) -> PickResult<Vec<u8>> {
    // Snapshot of names to drop, taken before anything is rewritten
    let remove_sheets: HashSet<String> = sheets
        .iter()
        .filter(|s| !keep.contains(s.name.as_str()))
        .map(|s| s.name.clone())
        .collect();

    if remove_sheets.len() == sheets.len() {
        return Err(PickError::NoMatches);
    }

    let modifications = WorkbookModifications {
        remove_sheets,
        strip_macros: !format.keeps_macros(),
    };
    modify_workbook_xlsx(bytes, &modifications)
}
