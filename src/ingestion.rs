//! Reads uploaded tables from disk into [`RawTable`]s.
//!
//! Supported formats:
//! - `.csv`: UTF-8, falling back to Latin-1 when the bytes are not valid UTF-8
//! - `.xlsx` / `.xls`: the first worksheet (requires the `excel` feature)

use crate::error::{DashboardError, Result};
use crate::schema::RawTable;
use csv::ReaderBuilder;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// Picks the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xls" => Ok(FileFormat::Excel),
            _ => Err(DashboardError::UnsupportedFileFormat(
                path.display().to_string(),
            )),
        }
    }
}

pub fn read_table(path: impl AsRef<Path>) -> Result<RawTable> {
    let path = path.as_ref();
    match FileFormat::from_path(path)? {
        FileFormat::Csv => {
            let bytes = std::fs::read(path)?;
            read_csv_bytes(&bytes)
        }
        FileFormat::Excel => read_excel(path),
    }
}

/// Parses CSV content whose first record is the header row. Short rows are
/// padded with blank cells and long rows are cut to the header width.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<RawTable> {
    let text = decode_text(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut row: Vec<Option<String>> = record.iter().take(width).map(cell).collect();
        row.resize(width, None);
        rows.push(row);
    }

    Ok(RawTable::new(headers, rows))
}

fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn cell(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(feature = "excel")]
fn read_excel(path: &Path) -> Result<RawTable> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| DashboardError::FileRead(format!("{}: {}", path.display(), e)))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(DashboardError::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        }
        None => {
            return Err(DashboardError::FileRead(format!(
                "{}: workbook has no worksheets",
                path.display()
            )))
        }
    };

    Ok(range_to_table(&range))
}

/// First row is the header row. Numeric cells keep calamine's display form,
/// so a year stored as `2025.0` reads back as "2025".
#[cfg(feature = "excel")]
fn range_to_table(range: &calamine::Range<calamine::Data>) -> RawTable {
    use calamine::Data;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string()).collect(),
        None => return RawTable::default(),
    };

    let body = rows
        .map(|row| {
            row.iter()
                .map(|c| match c {
                    Data::Empty => None,
                    other => cell(&other.to_string()),
                })
                .collect()
        })
        .collect();

    RawTable::new(headers, body)
}

#[cfg(not(feature = "excel"))]
fn read_excel(path: &Path) -> Result<RawTable> {
    Err(DashboardError::UnsupportedFileFormat(format!(
        "{} (Excel support is disabled)",
        path.display()
    )))
}
