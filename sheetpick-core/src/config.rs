//! Configuration of the summary extraction rules

use crate::error::{PickError, PickResult};
use crate::reader::CellAddress;
use crate::reader::address::{MAX_COLS, parse_column};
use crate::summary::{DEFAULT_NAV_LABEL, NavLocator, SummaryRules, normalize_label};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PickerConfig {
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl PickerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PickResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text, validating the extraction rules
    pub fn from_toml(content: &str) -> PickResult<Self> {
        let config: PickerConfig = toml::from_str(content)?;
        config.summary_rules()?;
        Ok(config)
    }

    /// Resolve the textual rules into parsed addresses
    pub fn summary_rules(&self) -> PickResult<SummaryRules> {
        let summary = &self.summary;
        let nav = match &summary.nav {
            NavConfig::Fixed { cell } => NavLocator::Fixed(CellAddress::parse(cell)?),
            NavConfig::LabelSearch {
                column,
                label,
                value_offset,
            } => {
                let column = parse_column(column)?;
                if normalize_label(label).is_empty() {
                    return Err(PickError::Config("NAV label must not be blank".to_string()));
                }
                let value_column = i64::from(column) + i64::from(*value_offset);
                if !(0..i64::from(MAX_COLS)).contains(&value_column) {
                    return Err(PickError::Config(format!(
                        "NAV value offset {} moves outside the sheet",
                        value_offset
                    )));
                }
                NavLocator::LabelSearch {
                    column,
                    label: label.clone(),
                    value_offset: *value_offset,
                }
            }
        };

        Ok(SummaryRules {
            name_cell: CellAddress::parse(&summary.name_cell)?,
            cash_cell: CellAddress::parse(&summary.cash_cell)?,
            nav,
            include_sheet_column: summary.include_sheet_column,
        })
    }
}

/// Where the summary fields come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_name_cell")]
    pub name_cell: String,
    #[serde(default = "default_cash_cell")]
    pub cash_cell: String,
    #[serde(default)]
    pub include_sheet_column: bool,
    #[serde(default)]
    pub nav: NavConfig,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            name_cell: default_name_cell(),
            cash_cell: default_cash_cell(),
            include_sheet_column: false,
            nav: NavConfig::default(),
        }
    }
}

/// NAV is either a fixed cell or found next to a label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum NavConfig {
    Fixed {
        cell: String,
    },
    LabelSearch {
        #[serde(default = "default_label_column")]
        column: String,
        #[serde(default = "default_label")]
        label: String,
        #[serde(default = "default_value_offset")]
        value_offset: i32,
    },
}

impl Default for NavConfig {
    fn default() -> Self {
        NavConfig::LabelSearch {
            column: default_label_column(),
            label: default_label(),
            value_offset: default_value_offset(),
        }
    }
}

fn default_name_cell() -> String {
    "B4".to_string()
}

fn default_cash_cell() -> String {
    "C27".to_string()
}

fn default_label_column() -> String {
    "A".to_string()
}

fn default_label() -> String {
    DEFAULT_NAV_LABEL.to_string()
}

fn default_value_offset() -> i32 {
    1
}
