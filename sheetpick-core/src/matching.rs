//! Partition of wanted sheet names into matched and missing

use serde::Serialize;
use std::collections::HashSet;

/// Wanted names split by presence in the workbook, each in wanted order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetMatch {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

impl SheetMatch {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Distinct matched names, used to decide which sheets survive filtering
    pub fn matched_set(&self) -> HashSet<&str> {
        self.matched.iter().map(String::as_str).collect()
    }
}

/// Match wanted names against the workbook's sheet names (exact, case-sensitive)
pub fn match_sheets<S: AsRef<str>>(wanted: &[String], available: &[S]) -> SheetMatch {
    let available: HashSet<&str> = available.iter().map(|s| s.as_ref()).collect();

    let (matched, missing): (Vec<String>, Vec<String>) = wanted
        .iter()
        .cloned()
        .partition(|name| available.contains(name.as_str()));

    SheetMatch { matched, missing }
}
