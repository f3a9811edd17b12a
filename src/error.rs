use crate::period::PeriodKind;
use crate::schema::TableKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("{table} table is missing columns: {}", .missing.join(", "))]
    MissingColumns {
        table: TableKind,
        missing: Vec<String>,
    },

    #[error("The following month values in the {table} table are invalid: {}", .values.join(", "))]
    InvalidMonth { table: TableKind, values: Vec<String> },

    #[error(
        "{table} table has invalid month/year combinations on rows {}. Please check the 'month' and 'year' columns.",
        join_rows(.rows)
    )]
    PeriodDerivation { table: TableKind, rows: Vec<usize> },

    #[error("Unsupported file format '{0}'. Please upload a CSV or Excel file.")]
    UnsupportedFileFormat(String),

    #[error("File reading failed: {0}")]
    FileRead(String),

    #[error("Rollup integrity violation for {scope} ({period}): expected {expected}, got {actual}")]
    RollupIntegrityViolation {
        scope: String,
        period: PeriodKind,
        expected: f64,
        actual: f64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn join_rows(rows: &[usize]) -> String {
    rows.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, DashboardError>;
