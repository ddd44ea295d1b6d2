//! Build pipeline: selection → matching → filtered workbook and/or summary

use crate::error::{PickError, PickResult};
use crate::matching::{SheetMatch, match_sheets};
use crate::reader::{self, SheetEntry, package::sheet_entries_from_bytes};
use crate::selection::parse_wanted_sheets;
use crate::summary::{SummaryExtractor, SummaryRules, SummaryTable};
use crate::writer::{self, SUMMARY_FILE_NAME, SourceFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which outputs a build produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    #[default]
    FilteredWorkbook,
    SummarySheet,
    Both,
}

impl OutputMode {
    pub fn wants_filtered(&self) -> bool {
        matches!(self, OutputMode::FilteredWorkbook | OutputMode::Both)
    }

    pub fn wants_summary(&self) -> bool {
        matches!(self, OutputMode::SummarySheet | OutputMode::Both)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutputMode::FilteredWorkbook => "Filtered workbook",
            OutputMode::SummarySheet => "Summary sheet",
            OutputMode::Both => "Both",
        };
        write!(f, "{label}")
    }
}

/// Resolved inputs of one build
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Original file name; its extension decides macro handling
    pub workbook_name: &'a str,
    pub workbook_bytes: &'a [u8],
    pub selection_bytes: &'a [u8],
    pub mode: OutputMode,
}

/// A named blob offered for download / written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Result of a successful build; `missing` names are a warning, not an error
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub mode: OutputMode,
    pub source_format: SourceFormat,
    #[serde(flatten)]
    pub sheet_match: SheetMatch,
    pub outputs: Vec<OutputFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryTable>,
}

impl BuildReport {
    pub fn missing(&self) -> &[String] {
        &self.sheet_match.missing
    }
}

/// Inputs parsed and matched, nothing built yet
#[derive(Debug, Clone)]
pub struct Plan {
    pub source_format: SourceFormat,
    pub sheets: Vec<SheetEntry>,
    pub sheet_match: SheetMatch,
}

/// Parse the selection, inspect the workbook and match names
pub fn plan(request: &BuildRequest<'_>) -> PickResult<Plan> {
    let wanted = parse_wanted_sheets(request.selection_bytes)?;
    let source_format = SourceFormat::from_file_name(request.workbook_name)?;

    let sheets = sheet_entries_from_bytes(request.workbook_bytes)?;
    let available: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
    let sheet_match = match_sheets(&wanted, &available);

    if sheet_match.is_empty() {
        return Err(PickError::NoMatches);
    }

    tracing::info!(
        workbook = request.workbook_name,
        requested = wanted.len(),
        matched = sheet_match.matched.len(),
        "matched requested sheets"
    );
    if !sheet_match.missing.is_empty() {
        tracing::warn!(
            missing = %sheet_match.missing.join(", "),
            "sheets not found in workbook"
        );
    }

    Ok(Plan {
        source_format,
        sheets,
        sheet_match,
    })
}

/// Run a full build. Outputs exist only if every requested output succeeded.
pub fn build(request: &BuildRequest<'_>, rules: &SummaryRules) -> PickResult<BuildReport> {
    let Plan {
        source_format,
        sheets,
        sheet_match,
    } = plan(request)?;

    let mut outputs = Vec::new();
    let mut summary = None;

    if request.mode.wants_filtered() {
        let bytes = writer::filter_workbook(
            request.workbook_bytes,
            &sheets,
            &sheet_match.matched_set(),
            source_format,
        )?;
        let file_name = source_format.filtered_file_name();
        tracing::info!(file = %file_name, bytes = bytes.len(), "built filtered workbook");
        outputs.push(OutputFile { file_name, bytes });
    }

    if request.mode.wants_summary() {
        let workbook = reader::read_computed_values(request.workbook_bytes, &distinct(&sheet_match.matched))?;
        let table = SummaryExtractor::new(rules.clone()).extract(&workbook, &sheet_match.matched);
        let bytes = writer::write_summary_xlsx(&table)?;
        tracing::info!(file = SUMMARY_FILE_NAME, rows = table.rows.len(), "built summary workbook");
        outputs.push(OutputFile {
            file_name: SUMMARY_FILE_NAME.to_string(),
            bytes,
        });
        summary = Some(table);
    }

    Ok(BuildReport {
        mode: request.mode,
        source_format,
        sheet_match,
        outputs,
        summary,
    })
}

fn distinct(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flags() {
        assert!(OutputMode::FilteredWorkbook.wants_filtered());
        assert!(!OutputMode::FilteredWorkbook.wants_summary());
        assert!(OutputMode::SummarySheet.wants_summary());
        assert!(!OutputMode::SummarySheet.wants_filtered());
        assert!(OutputMode::Both.wants_filtered() && OutputMode::Both.wants_summary());
        assert_eq!(OutputMode::default(), OutputMode::FilteredWorkbook);
        assert_eq!(OutputMode::SummarySheet.to_string(), "Summary sheet");
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let names: Vec<String> = ["b", "a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(distinct(&names), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_selection_errors_come_before_workbook_errors() {
        let request = BuildRequest {
            workbook_name: "book.xlsx",
            workbook_bytes: b"not a zip",
            selection_bytes: b"Sheet\nFund A\n",
            mode: OutputMode::Both,
        };
        assert!(matches!(
            build(&request, &SummaryRules::default()),
            Err(PickError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_corrupt_workbook_is_an_error() {
        let request = BuildRequest {
            workbook_name: "book.xlsx",
            workbook_bytes: b"not a zip",
            selection_bytes: b"SheetName\nFund A\n",
            mode: OutputMode::FilteredWorkbook,
        };
        assert!(matches!(plan(&request), Err(PickError::Zip(_))));
    }
}
