//! Summary workbook export

use crate::error::PickResult;
use crate::summary::{SummaryTable, SummaryValue};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

pub const SUMMARY_FILE_NAME: &str = "Summary.xlsx";
pub const SUMMARY_SHEET_NAME: &str = "Summary";

/// Serialize the summary table as a single-sheet workbook with a header row
pub fn write_summary_xlsx(table: &SummaryTable) -> PickResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SUMMARY_SHEET_NAME)?;

    for (col, header) in table.headers().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let row_idx = (i + 1) as u32;
        let mut col = 0u16;

        if table.include_sheet_column {
            worksheet.write_string(row_idx, col, &row.sheet)?;
            col += 1;
        }

        write_value(worksheet, row_idx, col, &row.name, &date_format)?;
        // Missing numbers stay blank
        if let Some(nav) = row.nav {
            worksheet.write_number(row_idx, col + 1, nav)?;
        }
        if let Some(cash) = row.cash {
            worksheet.write_number(row_idx, col + 2, cash)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &SummaryValue,
    date_format: &Format,
) -> PickResult<()> {
    match value {
        SummaryValue::Text(s) => {
            worksheet.write_string(row, col, s)?;
        }
        SummaryValue::Number(n) => {
            worksheet.write_number(row, col, *n)?;
        }
        SummaryValue::Boolean(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        SummaryValue::Date(serial) => {
            worksheet.write_number_with_format(row, col, *serial, date_format)?;
        }
        SummaryValue::Missing => {}
    }
    Ok(())
}
