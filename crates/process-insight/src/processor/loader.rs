//! Reading delimited text and spreadsheets into a [`Dataset`].
//!
//! The first column becomes the row index. It is parsed as date-times when
//! every entry allows it; otherwise the original text is kept and a warning is
//! returned. The remaining columns are coerced to integers or floats when all
//! of their non-missing cells parse, and left as text otherwise.

use crate::error::{AnalysisError, ComputationWarning, Result, WarningKind};
use crate::types::{Dataset, RowIndex};
use crate::utils::{TIMESTAMP_FORMAT, is_null_marker, parse_float, parse_integer, parse_timestamp};
use calamine::{Data, DataType as _, Reader, open_workbook_auto};
use chrono::NaiveDateTime;
use encoding_rs::Encoding;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Name given to an index column whose header is blank.
const DEFAULT_INDEX_NAME: &str = "index";

/// A freshly loaded dataset and what was learned while loading it.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub dataset: Dataset,
    /// Text encoding that decoded the input; `None` for spreadsheets.
    pub encoding: Option<String>,
    pub warnings: Vec<ComputationWarning>,
}

/// Input formats recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Spreadsheet,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(InputFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(InputFormat::Spreadsheet),
            _ => Err(AnalysisError::UnsupportedFormat(ext)),
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Load a file, choosing the reader from its extension.
pub fn load_file(path: &Path, encodings: &[String]) -> Result<Loaded> {
    match InputFormat::from_path(path)? {
        InputFormat::Csv => {
            let bytes = std::fs::read(path).map_err(|e| {
                AnalysisError::Load(format!("cannot read {}: {}", path.display(), e))
            })?;
            load_csv_bytes(&bytes, encodings)
        }
        InputFormat::Spreadsheet => load_spreadsheet(path),
    }
}

/// Parse delimited text, trying each candidate encoding in order.
pub fn load_csv_bytes(bytes: &[u8], encodings: &[String]) -> Result<Loaded> {
    let (text, encoding) = decode_text(bytes, encodings)?;

    let frame = CsvReadOptions::default()
        .with_has_header(true)
        // Read every column as text; coercion happens below.
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()
        .map_err(|e| AnalysisError::Load(format!("malformed delimited text: {}", e)))?;

    let mut headers = Vec::with_capacity(frame.width());
    let mut columns = Vec::with_capacity(frame.width());
    for column in frame.get_columns() {
        headers.push(column.name().to_string());
        let as_text = column.as_materialized_series().cast(&DataType::String)?;
        let cells: Vec<Option<String>> = as_text
            .str()?
            .into_iter()
            .map(|cell| cell.map(str::to_string))
            .collect();
        columns.push(cells);
    }

    let (dataset, warnings) = build_dataset(headers, columns)?;
    info!(
        rows = dataset.height(),
        columns = dataset.width(),
        encoding = %encoding,
        "Loaded delimited text"
    );
    Ok(Loaded {
        dataset,
        encoding: Some(encoding),
        warnings,
    })
}

/// Read the first sheet of a workbook; row 0 holds the headers.
pub fn load_spreadsheet(path: &Path) -> Result<Loaded> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AnalysisError::Load("workbook has no worksheets".to_string()))??;

    let rows: Vec<&[Data]> = range.rows().collect();
    let Some((header_row, body)) = rows.split_first() else {
        return Err(AnalysisError::Load("first worksheet is empty".to_string()));
    };

    let headers: Vec<String> = header_row.iter().map(|c| cell_text(c).unwrap_or_default()).collect();
    let columns: Vec<Vec<Option<String>>> = (0..headers.len())
        .map(|col| {
            body.iter()
                .map(|row| row.get(col).and_then(cell_text))
                .collect()
        })
        .collect();

    let (dataset, warnings) = build_dataset(headers, columns)?;
    info!(
        rows = dataset.height(),
        columns = dataset.width(),
        path = %path.display(),
        "Loaded spreadsheet"
    );
    Ok(Loaded {
        dataset,
        encoding: None,
        warnings,
    })
}

// =============================================================================
// Decoding
// =============================================================================

fn lookup_encoding(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).or_else(|| {
        match label.trim().to_ascii_lowercase().as_str() {
            // Windows code page 932 is decoded as its WHATWG superset.
            "cp932" | "ms932" | "windows-932" => Some(encoding_rs::SHIFT_JIS),
            _ => None,
        }
    })
}

/// Decode `bytes` with the first candidate that accepts them without errors.
///
/// Returns the text and the label of the encoding that worked.
pub fn decode_text(bytes: &[u8], encodings: &[String]) -> Result<(String, String)> {
    for label in encodings {
        let Some(encoding) = lookup_encoding(label) else {
            warn!("Unknown encoding label '{}' skipped", label);
            continue;
        };
        let input = if encoding == encoding_rs::UTF_8 {
            bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
        } else {
            bytes
        };
        match encoding.decode_without_bom_handling_and_without_replacement(input) {
            Some(text) => {
                debug!("Decoded input as {}", label);
                return Ok((text.into_owned(), label.clone()));
            }
            None => debug!("Input is not valid {}", label),
        }
    }
    Err(AnalysisError::Load(
        "could not detect text encoding".to_string(),
    ))
}

// =============================================================================
// Coercion
// =============================================================================

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Turn header names and raw text columns into a dataset.
fn build_dataset(
    headers: Vec<String>,
    mut columns: Vec<Vec<Option<String>>>,
) -> Result<(Dataset, Vec<ComputationWarning>)> {
    if headers.is_empty() || columns.is_empty() {
        return Err(AnalysisError::Load("input has no columns".to_string()));
    }

    let index_cells = columns.remove(0);
    let mut headers = headers.into_iter();
    let index_name = headers
        .next()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());

    let mut warnings = Vec::new();
    let index = match parse_index(&index_cells) {
        Some(stamps) => RowIndex::Timestamps(stamps),
        None => {
            let warning = ComputationWarning::new(
                WarningKind::IndexCoercion,
                format!(
                    "Index column '{}' could not be converted to date-times; keeping its original values",
                    index_name
                ),
            );
            warn!("{}", warning);
            warnings.push(warning);
            RowIndex::Labels(
                index_cells
                    .into_iter()
                    .map(|cell| cell.unwrap_or_default())
                    .collect(),
            )
        }
    };

    let series: Vec<Column> = headers
        .zip(columns.iter())
        .map(|(name, cells)| coerce_column(&name, cells).into())
        .collect();
    let frame = DataFrame::new(series)?;

    Ok((Dataset::new(index_name, index, frame)?, warnings))
}

/// Timestamps for every cell, or `None` if any cell is missing or unparseable.
fn parse_index(cells: &[Option<String>]) -> Option<Vec<NaiveDateTime>> {
    cells
        .iter()
        .map(|cell| cell.as_deref().and_then(parse_timestamp))
        .collect()
}

/// Int64 when every present cell is an integer, Float64 when every present
/// cell is a number, text otherwise. Null markers become nulls.
fn coerce_column(name: &str, cells: &[Option<String>]) -> Series {
    let present: Vec<Option<&str>> = cells
        .iter()
        .map(|cell| cell.as_deref().filter(|s| !is_null_marker(s)))
        .collect();

    if present.iter().all(Option::is_none) {
        return Series::new(name.into(), vec![None::<f64>; cells.len()]);
    }

    let ints: Option<Vec<Option<i64>>> = present
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => parse_integer(s).map(Some),
        })
        .collect();
    if let Some(values) = ints {
        return Series::new(name.into(), values);
    }

    let floats: Option<Vec<Option<f64>>> = present
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => parse_float(s).map(Some),
        })
        .collect();
    if let Some(values) = floats {
        return Series::new(name.into(), values);
    }

    let text: Vec<Option<String>> = present
        .iter()
        .map(|cell| cell.map(str::to_string))
        .collect();
    Series::new(name.into(), text)
}
