use crate::engine::PeriodRow;
use crate::normalizer::{Normalized, Record, RowView, MONTH_COLUMN, YEAR_COLUMN};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const EXPENSE_COLUMN: &str = "expense";
pub const EXPENSE_CATEGORY_COLUMN: &str = "expense category";
pub const ACTUAL_COLUMN: &str = "actual";
pub const TARGET_COLUMN: &str = "target";

pub const PROJECT_COLUMN: &str = "project";
pub const DM_INFLOW_ACTUAL_COLUMN: &str = "dm inflow actual";
pub const DM_INFLOW_TARGET_COLUMN: &str = "dm inflow target";
pub const SALES_VALUE_TARGET_COLUMN: &str = "sales value target";
pub const ACTUAL_SALES_VALUE_COLUMN: &str = "actual sales value";
pub const TARGET_SALES_UNIT_COLUMN: &str = "target sales unit";
pub const ACTUAL_SALES_UNIT_COLUMN: &str = "actual sales unit";
pub const COLLECTION_TARGET_COLUMN: &str = "collection target";
pub const COLLECTION_ACHIEVED_COLUMN: &str = "collection achieved";

pub const EXPENSE_REQUIRED_COLUMNS: &[&str] = &[
    EXPENSE_COLUMN,
    EXPENSE_CATEGORY_COLUMN,
    MONTH_COLUMN,
    YEAR_COLUMN,
    ACTUAL_COLUMN,
    TARGET_COLUMN,
];

pub const TARGET_REQUIRED_COLUMNS: &[&str] = &[
    PROJECT_COLUMN,
    MONTH_COLUMN,
    YEAR_COLUMN,
    DM_INFLOW_ACTUAL_COLUMN,
    DM_INFLOW_TARGET_COLUMN,
    SALES_VALUE_TARGET_COLUMN,
    ACTUAL_SALES_VALUE_COLUMN,
    TARGET_SALES_UNIT_COLUMN,
    ACTUAL_SALES_UNIT_COLUMN,
    COLLECTION_TARGET_COLUMN,
    COLLECTION_ACHIEVED_COLUMN,
];

/// The minimum a target table needs for the cash-flow statement.
pub const INFLOW_REQUIRED_COLUMNS: &[&str] = &[
    PROJECT_COLUMN,
    MONTH_COLUMN,
    YEAR_COLUMN,
    DM_INFLOW_ACTUAL_COLUMN,
    DM_INFLOW_TARGET_COLUMN,
];

const TARGET_SYNONYMS: &[(&str, &str)] = &[
    ("sales target", SALES_VALUE_TARGET_COLUMN),
    ("sales achieved", ACTUAL_SALES_VALUE_COLUMN),
    ("unit target", TARGET_SALES_UNIT_COLUMN),
    ("unit achieved", ACTUAL_SALES_UNIT_COLUMN),
    ("dm inflows actual", DM_INFLOW_ACTUAL_COLUMN),
    ("dm inflow achieved", DM_INFLOW_ACTUAL_COLUMN),
    ("dm inflows target", DM_INFLOW_TARGET_COLUMN),
];

const EXPENSE_SYNONYMS: &[(&str, &str)] = &[
    ("expense head", EXPENSE_COLUMN),
    ("category", EXPENSE_CATEGORY_COLUMN),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum TableKind {
    Target,
    Expense,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Target => f.write_str("Target"),
            TableKind::Expense => f.write_str("Expense"),
        }
    }
}

/// An uploaded table before validation: header row plus string cells, with
/// blank cells as `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_rows<const N: usize>(headers: &[&str], rows: &[[&str; N]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| {
                        if cell.trim().is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Non-fatal: numeric cells in `column` that could not be parsed and were
/// treated as empty. Totals that include them are understated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NumericCoercionWarning {
    pub table: TableKind,
    pub column: String,
    pub cells: usize,
}

impl fmt::Display for NumericCoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cell(s) in {} column '{}' could not be parsed as numbers and were treated as empty",
            self.cells, self.table, self.column
        )
    }
}

/// Which target-table columns are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetColumnSet {
    /// Every metric column must be present.
    #[default]
    Full,
    /// Only project, period and DM inflow columns are mandatory; other
    /// metrics are reported when present and omitted otherwise.
    InflowOnly,
}

impl TargetColumnSet {
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TargetColumnSet::Full => TARGET_REQUIRED_COLUMNS,
            TargetColumnSet::InflowOnly => INFLOW_REQUIRED_COLUMNS,
        }
    }
}

/// A (target, achieved) column pair tracked in the target table. Variant
/// order is display order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum TargetMetric {
    #[serde(rename = "Sales Unit")]
    SalesUnit,
    #[serde(rename = "Sales Value")]
    SalesValue,
    #[serde(rename = "Collection")]
    Collection,
    #[serde(rename = "DM Inflows")]
    DmInflows,
}

impl TargetMetric {
    pub const ALL: [TargetMetric; 4] = [
        TargetMetric::SalesUnit,
        TargetMetric::SalesValue,
        TargetMetric::Collection,
        TargetMetric::DmInflows,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TargetMetric::SalesUnit => "Sales Unit",
            TargetMetric::SalesValue => "Sales Value",
            TargetMetric::Collection => "Collection",
            TargetMetric::DmInflows => "DM Inflows",
        }
    }

    pub fn target_column(&self) -> &'static str {
        match self {
            TargetMetric::SalesUnit => TARGET_SALES_UNIT_COLUMN,
            TargetMetric::SalesValue => SALES_VALUE_TARGET_COLUMN,
            TargetMetric::Collection => COLLECTION_TARGET_COLUMN,
            TargetMetric::DmInflows => DM_INFLOW_TARGET_COLUMN,
        }
    }

    pub fn achieved_column(&self) -> &'static str {
        match self {
            TargetMetric::SalesUnit => ACTUAL_SALES_UNIT_COLUMN,
            TargetMetric::SalesValue => ACTUAL_SALES_VALUE_COLUMN,
            TargetMetric::Collection => COLLECTION_ACHIEVED_COLUMN,
            TargetMetric::DmInflows => DM_INFLOW_ACTUAL_COLUMN,
        }
    }
}

impl fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One budgeted-vs-actual spend line for an expense head in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub expense: Option<String>,
    pub expense_category: Option<String>,
    pub month: String,
    pub year: i32,
    pub actual: Option<f64>,
    pub target: Option<f64>,
    pub period_start: NaiveDate,
}

impl Record for ExpenseRecord {
    const KIND: TableKind = TableKind::Expense;
    const REQUIRED_COLUMNS: &'static [&'static str] = EXPENSE_REQUIRED_COLUMNS;
    const NUMERIC_COLUMNS: &'static [&'static str] = &[ACTUAL_COLUMN, TARGET_COLUMN];
    const CATEGORICAL_COLUMNS: &'static [&'static str] =
        &[EXPENSE_COLUMN, EXPENSE_CATEGORY_COLUMN];
    const COLUMN_SYNONYMS: &'static [(&'static str, &'static str)] = EXPENSE_SYNONYMS;

    fn from_row(row: &RowView<'_>) -> Self {
        Self {
            expense: row.text(EXPENSE_COLUMN),
            expense_category: row.text(EXPENSE_CATEGORY_COLUMN),
            month: row.month.to_string(),
            year: row.year,
            actual: row.number(ACTUAL_COLUMN),
            target: row.number(TARGET_COLUMN),
            period_start: row.period_start,
        }
    }
}

impl PeriodRow for ExpenseRecord {
    fn period_start(&self) -> NaiveDate {
        self.period_start
    }
}

/// Targets and achievements for one project in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub project: Option<String>,
    pub month: String,
    pub year: i32,
    pub period_start: NaiveDate,
    pub sales_target: Option<f64>,
    pub sales_achieved: Option<f64>,
    pub unit_target: Option<f64>,
    pub unit_achieved: Option<f64>,
    pub collection_target: Option<f64>,
    pub collection_achieved: Option<f64>,
    pub dm_inflow_target: Option<f64>,
    pub dm_inflow_actual: Option<f64>,
}

impl TargetRecord {
    /// `(target, achieved)` for `metric`.
    pub fn values(&self, metric: TargetMetric) -> (Option<f64>, Option<f64>) {
        match metric {
            TargetMetric::SalesUnit => (self.unit_target, self.unit_achieved),
            TargetMetric::SalesValue => (self.sales_target, self.sales_achieved),
            TargetMetric::Collection => (self.collection_target, self.collection_achieved),
            TargetMetric::DmInflows => (self.dm_inflow_target, self.dm_inflow_actual),
        }
    }
}

impl Record for TargetRecord {
    const KIND: TableKind = TableKind::Target;
    const REQUIRED_COLUMNS: &'static [&'static str] = TARGET_REQUIRED_COLUMNS;
    const NUMERIC_COLUMNS: &'static [&'static str] = &[
        DM_INFLOW_ACTUAL_COLUMN,
        DM_INFLOW_TARGET_COLUMN,
        SALES_VALUE_TARGET_COLUMN,
        ACTUAL_SALES_VALUE_COLUMN,
        TARGET_SALES_UNIT_COLUMN,
        ACTUAL_SALES_UNIT_COLUMN,
        COLLECTION_TARGET_COLUMN,
        COLLECTION_ACHIEVED_COLUMN,
    ];
    const CATEGORICAL_COLUMNS: &'static [&'static str] = &[PROJECT_COLUMN];
    const COLUMN_SYNONYMS: &'static [(&'static str, &'static str)] = TARGET_SYNONYMS;

    fn from_row(row: &RowView<'_>) -> Self {
        Self {
            project: row.text(PROJECT_COLUMN),
            month: row.month.to_string(),
            year: row.year,
            period_start: row.period_start,
            sales_target: row.number(SALES_VALUE_TARGET_COLUMN),
            sales_achieved: row.number(ACTUAL_SALES_VALUE_COLUMN),
            unit_target: row.number(TARGET_SALES_UNIT_COLUMN),
            unit_achieved: row.number(ACTUAL_SALES_UNIT_COLUMN),
            collection_target: row.number(COLLECTION_TARGET_COLUMN),
            collection_achieved: row.number(COLLECTION_ACHIEVED_COLUMN),
            dm_inflow_target: row.number(DM_INFLOW_TARGET_COLUMN),
            dm_inflow_actual: row.number(DM_INFLOW_ACTUAL_COLUMN),
        }
    }
}

impl PeriodRow for TargetRecord {
    fn period_start(&self) -> NaiveDate {
        self.period_start
    }
}

pub type ExpenseTable = Normalized<ExpenseRecord>;
pub type TargetTable = Normalized<TargetRecord>;

impl Normalized<ExpenseRecord> {
    /// Expense head to category. When a head is listed under several
    /// categories the last row wins; heads without a category are left out.
    pub fn category_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for record in &self.records {
            if let (Some(head), Some(category)) = (&record.expense, &record.expense_category) {
                map.insert(head.clone(), category.clone());
            }
        }
        map
    }

    pub fn expense_heads(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter_map(|r| r.expense.clone())
            .collect()
    }
}

impl Normalized<TargetRecord> {
    /// Metrics whose target and achieved columns are both present.
    pub fn tracked_metrics(&self) -> Vec<TargetMetric> {
        TargetMetric::ALL
            .into_iter()
            .filter(|m| self.has_column(m.target_column()) && self.has_column(m.achieved_column()))
            .collect()
    }

    pub fn projects(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter_map(|r| r.project.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{normalize, normalize_with};

    #[test]
    fn test_category_map_last_row_wins() {
        let raw = RawTable::from_rows(
            &["expense", "expense category", "month", "year", "actual", "target"],
            &[
                ["Rent", "Office", "April", "2025", "1", "1"],
                ["Rent", "Facilities", "May", "2025", "1", "1"],
                ["Salary", "", "May", "2025", "1", "1"],
            ],
        );
        let table: ExpenseTable = normalize(&raw).unwrap();
        let map = table.category_map();
        assert_eq!(map.get("Rent").map(String::as_str), Some("Facilities"));
        assert!(!map.contains_key("Salary"));
        assert_eq!(table.expense_heads().len(), 2);
    }

    #[test]
    fn test_tracked_metrics_follow_present_columns() {
        let raw = RawTable::from_rows(
            &[
                "project",
                "month",
                "year",
                "dm inflow actual",
                "dm inflow target",
                "collection target",
            ],
            &[["Tower A", "May", "2025", "1", "2", "3"]],
        );
        let table: TargetTable = normalize_with(&raw, INFLOW_REQUIRED_COLUMNS).unwrap();
        assert_eq!(table.tracked_metrics(), vec![TargetMetric::DmInflows]);
        assert_eq!(table.projects().into_iter().collect::<Vec<_>>(), vec!["Tower A"]);
    }

    #[test]
    fn test_metric_serializes_with_display_label() {
        let json = serde_json::to_string(&TargetMetric::DmInflows).unwrap();
        assert_eq!(json, "\"DM Inflows\"");
        assert_eq!(TargetMetric::SalesUnit.to_string(), "Sales Unit");
    }

    #[test]
    fn test_coercion_warning_message() {
        let warning = NumericCoercionWarning {
            table: TableKind::Expense,
            column: "actual".to_string(),
            cells: 3,
        };
        assert!(warning.to_string().starts_with("3 cell(s) in Expense column 'actual'"));
    }
}
