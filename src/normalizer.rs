//! Validation and normalization of raw uploaded tables.
//!
//! Every step is a hard precondition for the next: header normalization,
//! required-column check, numeric coercion, categorical clean-up, month
//! validation and finally derivation of each row's `period_start`. A table
//! either normalizes completely or yields a typed error; nothing is
//! partially ingested.

use crate::error::{DashboardError, Result};
use crate::schema::{NumericCoercionWarning, RawTable, TableKind};
use crate::utils::{
    month_start, normalize_header, parse_number, parse_year, title_case, VALID_MONTHS,
};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

pub const MONTH_COLUMN: &str = "month";
pub const YEAR_COLUMN: &str = "year";

/// A typed row produced at the ingestion boundary.
pub trait Record: Sized {
    const KIND: TableKind;
    const REQUIRED_COLUMNS: &'static [&'static str];
    const NUMERIC_COLUMNS: &'static [&'static str];
    const CATEGORICAL_COLUMNS: &'static [&'static str];
    /// `(alias, canonical)` header pairs applied after header normalization.
    const COLUMN_SYNONYMS: &'static [(&'static str, &'static str)];

    fn from_row(row: &RowView<'_>) -> Self;
}

#[derive(Debug, Clone)]
enum Value {
    Text(Option<String>),
    Number(Option<f64>),
}

/// Read access to one normalized row, by canonical column name.
pub struct RowView<'a> {
    index: &'a HashMap<String, usize>,
    values: &'a [Value],
    pub month: &'a str,
    pub year: i32,
    pub period_start: NaiveDate,
}

impl RowView<'_> {
    pub fn text(&self, column: &str) -> Option<String> {
        match self.lookup(column)? {
            Value::Text(text) => text.clone(),
            Value::Number(_) => None,
        }
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        match self.lookup(column)? {
            Value::Number(number) => *number,
            Value::Text(_) => None,
        }
    }

    fn lookup(&self, column: &str) -> Option<&Value> {
        self.index.get(column).and_then(|&idx| self.values.get(idx))
    }
}

/// A fully validated table of typed records.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<R> {
    /// Canonical column names present in the source, in source order.
    pub columns: Vec<String>,
    pub records: Vec<R>,
    /// Numeric cells that could not be parsed and were treated as null.
    pub warnings: Vec<NumericCoercionWarning>,
}

impl<R> Normalized<R> {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Normalizes `raw` against the record type's own required column set.
pub fn normalize<R: Record>(raw: &RawTable) -> Result<Normalized<R>> {
    normalize_with(raw, R::REQUIRED_COLUMNS)
}

/// Normalizes `raw`, requiring `required` (plus `month` and `year`, which
/// every table needs to derive its period key).
pub fn normalize_with<R: Record>(raw: &RawTable, required: &[&str]) -> Result<Normalized<R>> {
    let columns = normalize_columns(&raw.headers, R::COLUMN_SYNONYMS);
    check_required_columns(R::KIND, &columns, required)?;

    let mut index: HashMap<String, usize> = HashMap::new();
    for (idx, column) in columns.iter().enumerate() {
        index.entry(column.clone()).or_insert(idx);
    }

    let mut unparseable = vec![0usize; columns.len()];
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(raw.rows.len());
    for cells in &raw.rows {
        let mut values = Vec::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            let cell = cells
                .get(idx)
                .and_then(|c| c.as_deref())
                .map(str::trim)
                .filter(|c| !c.is_empty());

            let value = if R::NUMERIC_COLUMNS.contains(&column.as_str()) {
                let parsed = cell.and_then(parse_number);
                if cell.is_some() && parsed.is_none() {
                    unparseable[idx] += 1;
                }
                Value::Number(parsed)
            } else if R::CATEGORICAL_COLUMNS.contains(&column.as_str())
                || column == MONTH_COLUMN
            {
                Value::Text(cell.map(title_case))
            } else {
                Value::Text(cell.map(str::to_string))
            };
            values.push(value);
        }
        rows.push(values);
    }

    // Both present: `check_required_columns` always requires them.
    let month_idx = index[MONTH_COLUMN];
    let year_idx = index[YEAR_COLUMN];

    let months: Vec<Option<String>> = rows
        .iter()
        .map(|values| match &values[month_idx] {
            Value::Text(text) => text.clone(),
            Value::Number(_) => None,
        })
        .collect();

    let invalid = find_invalid_months(months.iter().flatten().map(String::as_str));
    if !invalid.is_empty() {
        return Err(DashboardError::InvalidMonth {
            table: R::KIND,
            values: invalid,
        });
    }

    let mut derived = Vec::with_capacity(rows.len());
    let mut failed_rows = Vec::new();
    for (row_idx, values) in rows.iter().enumerate() {
        let year = match &values[year_idx] {
            Value::Text(text) => text.as_deref().and_then(parse_year),
            Value::Number(_) => None,
        };
        let period = months[row_idx]
            .as_deref()
            .zip(year)
            .and_then(|(month, year)| month_start(month, year).map(|start| (year, start)));
        match period {
            Some(period) => derived.push(period),
            None => failed_rows.push(row_idx + 1),
        }
    }
    if !failed_rows.is_empty() {
        return Err(DashboardError::PeriodDerivation {
            table: R::KIND,
            rows: failed_rows,
        });
    }

    let records = rows
        .iter()
        .zip(&months)
        .zip(derived)
        .map(|((values, month), (year, period_start))| {
            R::from_row(&RowView {
                index: &index,
                values,
                month: month.as_deref().unwrap_or_default(),
                year,
                period_start,
            })
        })
        .collect();

    let warnings = columns
        .iter()
        .zip(&unparseable)
        .filter(|(_, cells)| **cells > 0)
        .map(|(column, &cells)| NumericCoercionWarning {
            table: R::KIND,
            column: column.clone(),
            cells,
        })
        .collect();

    Ok(Normalized {
        columns,
        records,
        warnings,
    })
}

/// Normalizes header spellings and applies `(alias, canonical)` renames
/// where the canonical name is not already present.
pub fn normalize_columns(headers: &[String], synonyms: &[(&str, &str)]) -> Vec<String> {
    let mut columns: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    for (alias, canonical) in synonyms {
        if columns.iter().any(|c| c.as_str() == *canonical) {
            continue;
        }
        if let Some(column) = columns.iter_mut().find(|c| c.as_str() == *alias) {
            *column = canonical.to_string();
        }
    }
    columns
}

fn check_required_columns(table: TableKind, columns: &[String], required: &[&str]) -> Result<()> {
    let mut missing: Vec<String> = Vec::new();
    for column in required.iter().chain(&[MONTH_COLUMN, YEAR_COLUMN]) {
        if !columns.iter().any(|c| c == column) && !missing.iter().any(|m| m == column) {
            missing.push(column.to_string());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DashboardError::MissingColumns { table, missing })
    }
}

/// Every distinct month value not in the full-name vocabulary, in order of
/// first appearance. Values are compared after strip + title-case, so
/// "marc" and "MARC" are reported once.
pub fn find_invalid_months<'a, I>(months: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut invalid = Vec::new();
    for raw in months {
        let month = title_case(raw);
        if !VALID_MONTHS.contains(&month.as_str()) && seen.insert(month.clone()) {
            invalid.push(month);
        }
    }
    invalid
}
