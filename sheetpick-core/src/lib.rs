//! sheetpick: Core library for picking sheets out of Excel workbooks
//!
//! Given a workbook and a CSV list of wanted sheet names, this library builds
//! a filtered copy of the workbook that keeps only the wanted sheets, and/or a
//! one-row-per-sheet summary workbook (Name, NAV, Cash).

pub mod config;
pub mod error;
pub mod matching;
pub mod pipeline;
pub mod reader;
pub mod selection;
pub mod session;
pub mod summary;
pub mod writer;

pub use config::PickerConfig;
pub use error::{PickError, PickResult};
pub use matching::{SheetMatch, match_sheets};
pub use pipeline::{BuildReport, BuildRequest, OutputFile, OutputMode, Plan};
pub use session::{Upload, UploadSlots};
pub use summary::{SummaryRow, SummaryRules, SummaryTable, SummaryValue};
pub use writer::SourceFormat;

/// Main picker interface
#[derive(Debug, Clone, Default)]
pub struct SheetPicker {
    rules: SummaryRules,
}

impl SheetPicker {
    /// Create a picker with the built-in extraction rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a picker from a loaded configuration
    pub fn with_config(config: &PickerConfig) -> PickResult<Self> {
        Ok(Self {
            rules: config.summary_rules()?,
        })
    }

    /// Match names without building anything
    pub fn plan(&self, request: &BuildRequest<'_>) -> PickResult<Plan> {
        pipeline::plan(request)
    }

    /// Build every output the request's mode asks for
    pub fn build(&self, request: &BuildRequest<'_>) -> PickResult<BuildReport> {
        pipeline::build(request, &self.rules)
    }
}
