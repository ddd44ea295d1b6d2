//! Summary extraction: one row of Name / NAV / Cash per selected sheet

use crate::reader::{Cell, CellAddress, CellReadError, CellValue, Sheet, Workbook};
use serde::Serialize;

/// Label searched for when NAV is located by text
pub const DEFAULT_NAV_LABEL: &str = "Total Net Asset Value After IC Fall";

/// How the NAV value is found on a sheet
#[derive(Debug, Clone, PartialEq)]
pub enum NavLocator {
    /// Read a fixed address, e.g. `B114`
    Fixed(CellAddress),
    /// Scan `column` for a label and read the cell `value_offset` columns over
    LabelSearch {
        column: u32,
        label: String,
        value_offset: i32,
    },
}

/// Resolved extraction rules
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRules {
    pub name_cell: CellAddress,
    pub cash_cell: CellAddress,
    pub nav: NavLocator,
    /// Prepend a `Sheet` column holding the tab name
    pub include_sheet_column: bool,
}

impl Default for SummaryRules {
    fn default() -> Self {
        Self {
            name_cell: CellAddress::new(3, 1),  // B4
            cash_cell: CellAddress::new(26, 2), // C27
            nav: NavLocator::LabelSearch {
                column: 0,
                label: DEFAULT_NAV_LABEL.to_string(),
                value_offset: 1,
            },
            include_sheet_column: false,
        }
    }
}

/// A Name cell keeps whatever type it had
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Excel serial date
    Date(f64),
    Missing,
}

impl SummaryValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, SummaryValue::Missing)
    }
}

impl From<&CellValue> for SummaryValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Text(s) => SummaryValue::Text(s.clone()),
            CellValue::Number(n) => SummaryValue::Number(*n),
            CellValue::Boolean(b) => SummaryValue::Boolean(*b),
            CellValue::DateTime(serial) => SummaryValue::Date(*serial),
            CellValue::Empty | CellValue::Error(_) => SummaryValue::Missing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Sheet")]
    pub sheet: String,
    #[serde(rename = "Name")]
    pub name: SummaryValue,
    #[serde(rename = "NAV")]
    pub nav: Option<f64>,
    #[serde(rename = "Cash")]
    pub cash: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTable {
    #[serde(skip)]
    pub include_sheet_column: bool,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn headers(&self) -> Vec<&'static str> {
        if self.include_sheet_column {
            vec!["Sheet", "Name", "NAV", "Cash"]
        } else {
            vec!["Name", "NAV", "Cash"]
        }
    }
}

/// Builds summary rows from a workbook read in computed-values mode
pub struct SummaryExtractor {
    rules: SummaryRules,
    normalized_label: Option<String>,
}

impl SummaryExtractor {
    pub fn new(rules: SummaryRules) -> Self {
        let normalized_label = match &rules.nav {
            NavLocator::LabelSearch { label, .. } => Some(normalize_label(label)),
            NavLocator::Fixed(_) => None,
        };
        Self {
            rules,
            normalized_label,
        }
    }

    /// One row per matched entry, in matched order
    pub fn extract(&self, workbook: &Workbook, matched: &[String]) -> SummaryTable {
        let rows = matched
            .iter()
            .map(|name| match workbook.get_sheet(name) {
                Some(sheet) => self.extract_row(sheet),
                None => {
                    tracing::warn!(sheet = %name, "sheet not readable, summary row left blank");
                    SummaryRow {
                        sheet: name.clone(),
                        name: SummaryValue::Missing,
                        nav: None,
                        cash: None,
                    }
                }
            })
            .collect();

        SummaryTable {
            include_sheet_column: self.rules.include_sheet_column,
            rows,
        }
    }

    fn extract_row(&self, sheet: &Sheet) -> SummaryRow {
        let name = sheet
            .read(self.rules.name_cell)
            .map(SummaryValue::from)
            .unwrap_or_else(|e| {
                log_degraded(sheet, "Name", &e);
                SummaryValue::Missing
            });

        let cash = numeric_or_missing(sheet, "Cash", Some(read_numeric(sheet, self.rules.cash_cell)));
        let nav = numeric_or_missing(sheet, "NAV", self.read_nav(sheet));

        SummaryRow {
            sheet: sheet.name.clone(),
            name,
            nav,
            cash,
        }
    }

    fn read_nav(&self, sheet: &Sheet) -> Option<Result<f64, CellReadError>> {
        match &self.rules.nav {
            NavLocator::Fixed(address) => Some(read_numeric(sheet, *address)),
            NavLocator::LabelSearch {
                column,
                value_offset,
                ..
            } => {
                let target = self.normalized_label.as_deref().unwrap_or_default();
                let label_cell = locate_label(sheet, *column, target)?;
                let address = label_cell.address().offset_col(*value_offset)?;
                Some(read_numeric(sheet, address))
            }
        }
    }
}

fn numeric_or_missing(sheet: &Sheet, field: &str, read: Option<Result<f64, CellReadError>>) -> Option<f64> {
    match read {
        Some(Ok(value)) => Some(value),
        Some(Err(e)) => {
            log_degraded(sheet, field, &e);
            None
        }
        None => {
            tracing::debug!(sheet = %sheet.name, field, "label not found, leaving field blank");
            None
        }
    }
}

fn log_degraded(sheet: &Sheet, field: &str, error: &CellReadError) {
    tracing::debug!(sheet = %sheet.name, field, error = %error, "field unavailable, leaving it blank");
}

fn read_numeric(sheet: &Sheet, address: CellAddress) -> Result<f64, CellReadError> {
    coerce_numeric(sheet.read(address)?, address)
}

/// Lowercase, trim and collapse internal whitespace to single spaces
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `label` matches when it equals the target or contains it (both normalized)
pub fn label_matches(normalized_label: &str, normalized_target: &str) -> bool {
    !normalized_label.is_empty()
        && (normalized_label == normalized_target || normalized_label.contains(normalized_target))
}

/// First cell, top to bottom, in `column` whose label matches `normalized_target`
pub fn locate_label<'a>(sheet: &'a Sheet, column: u32, normalized_target: &str) -> Option<&'a Cell> {
    sheet
        .column_cells(column)
        .into_iter()
        .find(|cell| label_matches(&normalize_label(&cell.value.to_string()), normalized_target))
}

/// Numbers pass through; text must parse as a plain finite number
pub fn coerce_numeric(value: &CellValue, address: CellAddress) -> Result<f64, CellReadError> {
    let parsed = match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|n| n.is_finite())
        .ok_or(CellReadError::TypeMismatch {
            address,
            expected: "a number",
            found: value.type_name(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> CellAddress {
        CellAddress::parse(label).unwrap()
    }

    fn fund_sheet(name: &str) -> Sheet {
        let mut sheet = Sheet::new(name);
        sheet.set_value(addr("B4"), CellValue::Text("Growth Fund".into()));
        sheet.set_value(addr("C27"), CellValue::Number(1000.5));
        sheet.set_value(addr("A10"), CellValue::Text("Total Assets".into()));
        sheet.set_value(addr("B10"), CellValue::Number(1.0));
        sheet.set_value(
            addr("A50"),
            CellValue::Text("Total Net Asset Value After IC Fall".into()),
        );
        sheet.set_value(addr("B50"), CellValue::Number(5_000_000.0));
        sheet
    }

    #[test]
    fn test_normalize_label() {
        let target = normalize_label(DEFAULT_NAV_LABEL);
        for label in [
            "Total Net Asset Value  After IC Fall",
            "TOTAL NET ASSET VALUE AFTER IC FALL",
            "total net asset value after ic fall",
            "  Total\tNet Asset Value After IC Fall \n",
        ] {
            assert_eq!(normalize_label(label), target, "{label:?}");
        }
    }

    #[test]
    fn test_label_matches_substring() {
        let target = normalize_label(DEFAULT_NAV_LABEL);
        assert!(label_matches(
            &normalize_label("Total Net Asset Value After IC Fall (USD)"),
            &target
        ));
        assert!(!label_matches(&normalize_label("Total Net Asset Value"), &target));
        assert!(!label_matches("", &target));
    }

    #[test]
    fn test_extract_label_search_row() {
        let mut workbook = Workbook::default();
        workbook.sheets.push(fund_sheet("Fund B"));

        let extractor = SummaryExtractor::new(SummaryRules::default());
        let table = extractor.extract(&workbook, &["Fund B".to_string()]);

        assert_eq!(
            table.rows,
            vec![SummaryRow {
                sheet: "Fund B".to_string(),
                name: SummaryValue::Text("Growth Fund".into()),
                nav: Some(5_000_000.0),
                cash: Some(1000.5),
            }]
        );
        assert_eq!(table.headers(), vec!["Name", "NAV", "Cash"]);
    }

    #[test]
    fn test_first_label_match_wins() {
        let mut sheet = fund_sheet("Fund B");
        sheet.set_value(
            addr("A70"),
            CellValue::Text("total net asset value after ic fall".into()),
        );
        sheet.set_value(addr("B70"), CellValue::Number(42.0));

        let cell = locate_label(&sheet, 0, &normalize_label(DEFAULT_NAV_LABEL)).unwrap();
        assert_eq!(cell.row, 49);
    }

    #[test]
    fn test_missing_label_and_out_of_range_cells() {
        let mut sheet = Sheet::new("Tiny");
        sheet.set_value(addr("A1"), CellValue::Text("Something else".into()));

        let mut workbook = Workbook::default();
        workbook.sheets.push(sheet);

        let table = SummaryExtractor::new(SummaryRules::default())
            .extract(&workbook, &["Tiny".to_string()]);
        let row = &table.rows[0];
        assert_eq!(row.name, SummaryValue::Missing);
        assert_eq!(row.nav, None);
        assert_eq!(row.cash, None);
    }

    #[test]
    fn test_label_value_beyond_used_range_is_missing() {
        let mut sheet = Sheet::new("Edge");
        sheet.set_value(addr("A5"), CellValue::Text(DEFAULT_NAV_LABEL.into()));

        let extractor = SummaryExtractor::new(SummaryRules::default());
        assert!(matches!(
            extractor.read_nav(&sheet),
            Some(Err(CellReadError::OutOfRange(_)))
        ));
    }

    #[test]
    fn test_fixed_nav_with_sheet_column() {
        let mut sheet = fund_sheet("Fund B");
        sheet.set_value(addr("B114"), CellValue::Number(777.0));

        let mut workbook = Workbook::default();
        workbook.sheets.push(sheet);

        let rules = SummaryRules {
            nav: NavLocator::Fixed(addr("B114")),
            include_sheet_column: true,
            ..SummaryRules::default()
        };
        let table = SummaryExtractor::new(rules).extract(&workbook, &["Fund B".to_string()]);

        assert_eq!(table.headers(), vec!["Sheet", "Name", "NAV", "Cash"]);
        assert_eq!(table.rows[0].nav, Some(777.0));
        assert_eq!(table.rows[0].sheet, "Fund B");
    }

    #[test]
    fn test_rows_follow_matched_order_with_duplicates() {
        let mut workbook = Workbook::default();
        workbook.sheets.push(fund_sheet("Fund A"));
        workbook.sheets.push(fund_sheet("Fund C"));

        let matched = vec!["Fund C".to_string(), "Fund A".to_string(), "Fund C".to_string()];
        let table = SummaryExtractor::new(SummaryRules::default()).extract(&workbook, &matched);

        let sheets: Vec<&str> = table.rows.iter().map(|r| r.sheet.as_str()).collect();
        assert_eq!(sheets, vec!["Fund C", "Fund A", "Fund C"]);
    }

    #[test]
    fn test_coerce_numeric() {
        let a1 = addr("A1");
        assert_eq!(coerce_numeric(&CellValue::Number(1234.5), a1), Ok(1234.5));
        assert_eq!(coerce_numeric(&CellValue::Text(" 1234.5 ".into()), a1), Ok(1234.5));
        assert!(coerce_numeric(&CellValue::Text("1,234".into()), a1).is_err());
        assert!(coerce_numeric(&CellValue::Text("n/a".into()), a1).is_err());
        assert!(coerce_numeric(&CellValue::Text("inf".into()), a1).is_err());
        assert!(coerce_numeric(&CellValue::Boolean(true), a1).is_err());
        assert!(coerce_numeric(&CellValue::DateTime(45139.0), a1).is_err());
        assert!(coerce_numeric(&CellValue::Empty, a1).is_err());
        assert_eq!(
            coerce_numeric(&CellValue::Error("#REF!".into()), a1),
            Err(CellReadError::TypeMismatch {
                address: a1,
                expected: "a number",
                found: "an error value",
            })
        );
    }

    #[test]
    fn test_cash_text_and_mismatch() {
        let mut sheet = fund_sheet("Fund B");
        sheet.set_value(addr("C27"), CellValue::Text(" 250.75 ".into()));

        let mut workbook = Workbook::default();
        workbook.sheets.push(sheet);
        let mut broken = fund_sheet("Fund C");
        broken.set_value(addr("C27"), CellValue::Boolean(true));
        workbook.sheets.push(broken);

        let table = SummaryExtractor::new(SummaryRules::default())
            .extract(&workbook, &["Fund B".to_string(), "Fund C".to_string()]);
        assert_eq!(table.rows[0].cash, Some(250.75));
        assert_eq!(table.rows[1].cash, None);
        assert_eq!(table.rows[1].nav, Some(5_000_000.0));
    }

    #[test]
    fn test_name_keeps_cell_type() {
        assert_eq!(
            SummaryValue::from(&CellValue::Number(12.0)),
            SummaryValue::Number(12.0)
        );
        assert_eq!(
            SummaryValue::from(&CellValue::Error("#N/A".into())),
            SummaryValue::Missing
        );
        assert!(SummaryValue::from(&CellValue::Empty).is_missing());
        assert!(!SummaryValue::from(&CellValue::Boolean(false)).is_missing());
    }
}
