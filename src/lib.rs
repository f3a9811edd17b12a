//! # AOP Dashboard
//!
//! Computes the numbers behind an annual-operating-plan dashboard from two
//! uploaded tables: a target table (sales, collection and DM inflow targets
//! vs. achievements per project and month) and an expense table (budgeted
//! vs. actual spend per expense head and month).
//!
//! ## Core Concepts
//!
//! - **Reporting periods**: MTD, QTD and YTD always end on the last fully
//!   completed month before the as-of date. The fiscal year runs April-March.
//! - **Normalization**: headers, month names and category labels are cleaned
//!   and validated up front; any structural problem aborts the run before a
//!   single number is produced.
//! - **Rollups**: target and achieved are summed independently and
//!   `delta = achieved - target` is re-derived at every level, from expense
//!   head to category to grand total and net cash flow.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aop_dashboard::*;
//! use chrono::NaiveDate;
//!
//! let targets = read_table("targets.csv")?;
//! let expenses = read_table("expenses.xlsx")?;
//! let config = DashboardConfig::new(NaiveDate::from_ymd_opt(2025, 7, 10).unwrap())
//!     .with_project("Tower A");
//!
//! let dashboard = process_dashboard(&targets, &expenses, &config)?;
//! println!("{}", dashboard.to_json()?);
//! ```

pub mod engine;
pub mod error;
pub mod ingestion;
pub mod normalizer;
pub mod period;
pub mod report;
pub mod schema;
pub mod utils;

pub use engine::{
    fold_expense_hierarchy, net_cash_flow, rollup, rollup_by_month, rollup_by_project,
    rollup_expense_heads, rollup_expenses, rollup_metrics, rollup_metrics_by_month,
    rollup_metrics_multi, rollup_multi, verify_rollup_integrity, CategoryBreakdown,
    ExpenseBreakdown, MonthlyRollup, PeriodComparison, PeriodRow, Rollup, UNASSIGNED_PROJECT,
    UNCATEGORIZED, UNNAMED_EXPENSE,
};
pub use error::{DashboardError, Result};
pub use ingestion::{read_csv_bytes, read_table, FileFormat};
pub use normalizer::{normalize, normalize_with, Normalized, Record};
pub use period::{FiscalYearCalendar, Period, PeriodKind, ReportingPeriods};
pub use report::*;
pub use schema::*;
pub use utils::*;

use log::{debug, info, warn};
use std::path::Path;

pub struct DashboardProcessor;

impl DashboardProcessor {
    /// Normalizes both tables and builds every dashboard section. Validation
    /// failures in either table abort before any rollup runs.
    pub fn process(
        target_raw: &RawTable,
        expense_raw: &RawTable,
        config: &DashboardConfig,
    ) -> Result<Dashboard> {
        config.validate()?;

        let target: TargetTable =
            normalize_with(target_raw, config.target_columns.required_columns())?;
        let expense: ExpenseTable = normalize(expense_raw)?;

        let periods = ReportingPeriods::as_of(config.today);
        info!("Building dashboard as of {}", config.today);
        for period in periods.iter() {
            info!("{} covers {} to {}", period.kind, period.start, period.end);
        }
        debug!(
            "Normalized {} target rows and {} expense rows",
            target.len(),
            expense.len()
        );
        debug!(
            "Tracking metrics: {:?}",
            target
                .tracked_metrics()
                .iter()
                .map(TargetMetric::label)
                .collect::<Vec<_>>()
        );

        for warning in target.warnings.iter().chain(&expense.warnings) {
            warn!("{}", warning);
        }

        Ok(build_dashboard(&target, &expense, config))
    }

    /// [`DashboardProcessor::process`] followed by a check that expense heads,
    /// category subtotals and the grand total agree within `tolerance`.
    pub fn process_with_verification(
        target_raw: &RawTable,
        expense_raw: &RawTable,
        config: &DashboardConfig,
        tolerance: f64,
    ) -> Result<Dashboard> {
        let dashboard = Self::process(target_raw, expense_raw, config)?;

        verify_rollup_integrity(&dashboard.cash_flow.expenses, tolerance)?;

        Ok(dashboard)
    }

    pub fn process_files(
        target_path: impl AsRef<Path>,
        expense_path: impl AsRef<Path>,
        config: &DashboardConfig,
    ) -> Result<Dashboard> {
        let target_path = target_path.as_ref();
        let expense_path = expense_path.as_ref();
        debug!(
            "Reading target table from {} and expense table from {}",
            target_path.display(),
            expense_path.display()
        );

        let target_raw = read_table(target_path)?;
        let expense_raw = read_table(expense_path)?;

        Self::process(&target_raw, &expense_raw, config)
    }
}

pub fn process_dashboard(
    target_raw: &RawTable,
    expense_raw: &RawTable,
    config: &DashboardConfig,
) -> Result<Dashboard> {
    DashboardProcessor::process(target_raw, expense_raw, config)
}

pub fn process_with_verification(
    target_raw: &RawTable,
    expense_raw: &RawTable,
    config: &DashboardConfig,
    tolerance: f64,
) -> Result<Dashboard> {
    DashboardProcessor::process_with_verification(target_raw, expense_raw, config, tolerance)
}
