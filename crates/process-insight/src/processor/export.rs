//! Writing a dataset back out as CSV or XLSX bytes.

use crate::error::{AnalysisError, Result};
use crate::types::Dataset;
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use tracing::debug;

/// Worksheet name used for spreadsheet exports.
pub const SHEET_NAME: &str = "Data";

/// UTF-8 CSV with a header row; the index is the first column.
pub fn to_csv_bytes(data: &Dataset) -> Result<Vec<u8>> {
    let mut frame = data.to_export_frame()?;
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut frame)?;
    debug!(bytes = buffer.len(), "CSV export written");
    Ok(buffer)
}

/// XLSX workbook with a single `Data` sheet; the index is the first column.
pub fn to_xlsx_bytes(data: &Dataset) -> Result<Vec<u8>> {
    let frame = data.to_export_frame()?;
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col_idx, column) in frame.get_columns().iter().enumerate() {
        let col = u16::try_from(col_idx)
            .map_err(|_| AnalysisError::Export("too many columns for a worksheet".to_string()))?;
        sheet.write_string(0, col, column.name().as_str())?;

        let series = column.as_materialized_series();
        if is_numeric_dtype(series.dtype()) {
            let values = series.cast(&DataType::Float64)?;
            for (row_idx, value) in values.f64()?.into_iter().enumerate() {
                if let Some(v) = value.filter(|v| v.is_finite()) {
                    sheet.write_number(sheet_row(row_idx)?, col, v)?;
                }
            }
        } else {
            let values = series.cast(&DataType::String)?;
            for (row_idx, value) in values.str()?.into_iter().enumerate() {
                if let Some(text) = value {
                    sheet.write_string(sheet_row(row_idx)?, col, text)?;
                }
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(bytes = bytes.len(), "XLSX export written");
    Ok(bytes)
}

/// Worksheet row for data row `idx` (row 0 holds the header).
fn sheet_row(idx: usize) -> Result<u32> {
    u32::try_from(idx + 1)
        .map_err(|_| AnalysisError::Export("too many rows for a worksheet".to_string()))
}
