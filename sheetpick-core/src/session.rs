//! Upload slots held by a front end between interactions.
//!
//! The build pipeline never reads this store; callers resolve it into a
//! [`BuildRequest`] and pass plain bytes along.

use crate::error::{PickError, PickResult};
use crate::pipeline::{BuildRequest, OutputMode};
use std::path::Path;

/// A file handed over by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> Option<UploadKind> {
        let extension = Path::new(&self.file_name)
            .extension()
            .and_then(|s| s.to_str())?
            .to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" => Some(UploadKind::Workbook),
            "csv" => Some(UploadKind::Selection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Workbook,
    Selection,
}

/// Whether an offered upload filled a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Stored(UploadKind),
    /// The slot for this kind was already taken
    Ignored(UploadKind),
}

/// Two slots: the workbook and the sheet selection list
#[derive(Debug, Clone, Default)]
pub struct UploadSlots {
    workbook: Option<Upload>,
    selection: Option<Upload>,
}

impl UploadSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an upload in the slot matching its extension; the first file of
    /// each kind wins
    pub fn offer(&mut self, upload: Upload) -> PickResult<Offer> {
        let kind = upload
            .kind()
            .ok_or_else(|| PickError::UnsupportedFormat(upload.file_name.clone()))?;

        let slot = match kind {
            UploadKind::Workbook => &mut self.workbook,
            UploadKind::Selection => &mut self.selection,
        };

        if slot.is_some() {
            tracing::debug!(file = %upload.file_name, "slot already filled, ignoring upload");
            return Ok(Offer::Ignored(kind));
        }
        *slot = Some(upload);
        Ok(Offer::Stored(kind))
    }

    pub fn workbook(&self) -> Option<&Upload> {
        self.workbook.as_ref()
    }

    pub fn selection(&self) -> Option<&Upload> {
        self.selection.as_ref()
    }

    pub fn clear_workbook(&mut self) {
        self.workbook = None;
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn clear(&mut self) {
        self.clear_workbook();
        self.clear_selection();
    }

    pub fn is_ready(&self) -> bool {
        self.workbook.is_some() && self.selection.is_some()
    }

    /// Resolve both slots into a build request
    pub fn request(&self, mode: OutputMode) -> PickResult<BuildRequest<'_>> {
        let workbook = self
            .workbook
            .as_ref()
            .ok_or(PickError::MissingUpload("Excel workbook (.xlsx/.xlsm)"))?;
        let selection = self
            .selection
            .as_ref()
            .ok_or(PickError::MissingUpload("CSV with a 'SheetName' column"))?;

        Ok(BuildRequest {
            workbook_name: &workbook.file_name,
            workbook_bytes: &workbook.bytes,
            selection_bytes: &selection.bytes,
            mode,
        })
    }
}
