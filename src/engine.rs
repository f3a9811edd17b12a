//! Target vs. achieved rollups over reporting periods.
//!
//! Rows are filtered to a period (inclusive on both ends), grouped by a
//! caller-chosen key, and their target and achieved columns summed
//! independently with nulls contributing nothing. `delta` is always
//! re-derived as `achieved - target` from the final sums, never added up
//! from component deltas.

use crate::error::{DashboardError, Result};
use crate::period::{Period, PeriodKind, ReportingPeriods};
use crate::schema::{ExpenseRecord, ExpenseTable, TargetMetric, TargetRecord, TargetTable};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::Sum;

/// Category for expense heads missing from the head-to-category map.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Head for expense rows with a blank `expense` cell.
pub const UNNAMED_EXPENSE: &str = "Unnamed Expense";

/// Project for target rows with a blank `project` cell.
pub const UNASSIGNED_PROJECT: &str = "Unassigned";

/// A row keyed by the first day of the month it reports on.
pub trait PeriodRow {
    fn period_start(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Rollup {
    pub target: f64,
    pub achieved: f64,
    /// `achieved - target`; positive is favorable.
    pub delta: f64,
}

impl Rollup {
    pub fn new(target: f64, achieved: f64) -> Self {
        Self {
            target,
            achieved,
            delta: achieved - target,
        }
    }

    pub fn absorb(&mut self, other: &Rollup) {
        self.target += other.target;
        self.achieved += other.achieved;
        self.delta = self.achieved - self.target;
    }

    /// Component-wise `self - outflow` with the delta recomputed.
    pub fn net_of(&self, outflow: &Rollup) -> Rollup {
        Rollup::new(
            self.target - outflow.target,
            self.achieved - outflow.achieved,
        )
    }
}

impl<'a> Sum<&'a Rollup> for Rollup {
    fn sum<I: Iterator<Item = &'a Rollup>>(iter: I) -> Self {
        let mut total = Rollup::default();
        for rollup in iter {
            total.absorb(rollup);
        }
        total
    }
}

/// The same rollup evaluated for MTD, QTD and YTD.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PeriodComparison {
    #[serde(rename = "MTD")]
    pub mtd: Rollup,
    #[serde(rename = "QTD")]
    pub qtd: Rollup,
    #[serde(rename = "YTD")]
    pub ytd: Rollup,
}

impl PeriodComparison {
    pub fn get(&self, kind: PeriodKind) -> &Rollup {
        match kind {
            PeriodKind::Mtd => &self.mtd,
            PeriodKind::Qtd => &self.qtd,
            PeriodKind::Ytd => &self.ytd,
        }
    }

    fn get_mut(&mut self, kind: PeriodKind) -> &mut Rollup {
        match kind {
            PeriodKind::Mtd => &mut self.mtd,
            PeriodKind::Qtd => &mut self.qtd,
            PeriodKind::Ytd => &mut self.ytd,
        }
    }

    pub fn absorb(&mut self, other: &PeriodComparison) {
        for kind in PeriodKind::ALL {
            self.get_mut(kind).absorb(other.get(kind));
        }
    }

    pub fn net_of(&self, outflow: &PeriodComparison) -> PeriodComparison {
        PeriodComparison {
            mtd: self.mtd.net_of(&outflow.mtd),
            qtd: self.qtd.net_of(&outflow.qtd),
            ytd: self.ytd.net_of(&outflow.ytd),
        }
    }
}

impl<'a> Sum<&'a PeriodComparison> for PeriodComparison {
    fn sum<I: Iterator<Item = &'a PeriodComparison>>(iter: I) -> Self {
        let mut total = PeriodComparison::default();
        for comparison in iter {
            total.absorb(comparison);
        }
        total
    }
}

/// Sums `measure` (as `(target, achieved)`) per group key over the rows that
/// fall inside `period`. Rows whose key is `None` are skipped; groups with
/// no rows in range are absent from the result.
pub fn rollup<'a, R, I, K, G, M>(rows: I, period: &Period, group: G, measure: M) -> BTreeMap<K, Rollup>
where
    R: PeriodRow + 'a,
    I: IntoIterator<Item = &'a R>,
    K: Ord,
    G: Fn(&R) -> Option<K>,
    M: Fn(&R) -> (Option<f64>, Option<f64>),
{
    let mut sums: BTreeMap<K, (f64, f64)> = BTreeMap::new();
    for row in rows {
        if !period.contains(row.period_start()) {
            continue;
        }
        let Some(key) = group(row) else {
            continue;
        };
        let (target, achieved) = measure(row);
        let entry = sums.entry(key).or_insert((0.0, 0.0));
        entry.0 += target.unwrap_or(0.0);
        entry.1 += achieved.unwrap_or(0.0);
    }

    sums.into_iter()
        .map(|(key, (target, achieved))| (key, Rollup::new(target, achieved)))
        .collect()
}

/// [`rollup`] for MTD, QTD and YTD side by side. A key present in any period
/// is reported in all three, with zeros where it had no rows.
pub fn rollup_multi<'a, R, I, K, G, M>(
    rows: I,
    periods: &ReportingPeriods,
    group: G,
    measure: M,
) -> BTreeMap<K, PeriodComparison>
where
    R: PeriodRow + 'a,
    I: IntoIterator<Item = &'a R> + Clone,
    K: Ord,
    G: Fn(&R) -> Option<K>,
    M: Fn(&R) -> (Option<f64>, Option<f64>),
{
    let mut result: BTreeMap<K, PeriodComparison> = BTreeMap::new();
    for period in periods.iter() {
        for (key, rollup) in rollup(rows.clone(), period, &group, &measure) {
            *result.entry(key).or_default().get_mut(period.kind) = rollup;
        }
    }
    result
}

fn project_rows<'a>(
    table: &'a TargetTable,
    project: Option<&'a str>,
) -> impl Iterator<Item = &'a TargetRecord> + Clone {
    table
        .records
        .iter()
        .filter(move |r| project.map_or(true, |p| r.project.as_deref() == Some(p)))
}

fn tracked(table: &TargetTable, metrics: &[TargetMetric]) -> Vec<TargetMetric> {
    let tracked = table.tracked_metrics();
    metrics
        .iter()
        .copied()
        .filter(|m| tracked.contains(m))
        .collect()
}

/// One rollup per requested metric for a single period. Metrics whose
/// columns are absent from the table are left out.
pub fn rollup_metrics(
    table: &TargetTable,
    project: Option<&str>,
    metrics: &[TargetMetric],
    period: &Period,
) -> BTreeMap<TargetMetric, Rollup> {
    tracked(table, metrics)
        .into_iter()
        .map(|metric| {
            let sums = rollup(
                project_rows(table, project),
                period,
                |_: &TargetRecord| Some(()),
                |r: &TargetRecord| r.values(metric),
            );
            (metric, sums.get(&()).copied().unwrap_or_default())
        })
        .collect()
}

/// [`rollup_metrics`] for MTD, QTD and YTD.
pub fn rollup_metrics_multi(
    table: &TargetTable,
    project: Option<&str>,
    metrics: &[TargetMetric],
    periods: &ReportingPeriods,
) -> BTreeMap<TargetMetric, PeriodComparison> {
    tracked(table, metrics)
        .into_iter()
        .map(|metric| {
            let sums = rollup_multi(
                project_rows(table, project),
                periods,
                |_: &TargetRecord| Some(()),
                |r: &TargetRecord| r.values(metric),
            );
            (metric, sums.get(&()).copied().unwrap_or_default())
        })
        .collect()
}

/// `metric` per project for MTD, QTD and YTD. Rows without a project are
/// grouped under [`UNASSIGNED_PROJECT`] so the projects sum to the
/// ungrouped metric total.
pub fn rollup_by_project(
    table: &TargetTable,
    project: Option<&str>,
    metric: TargetMetric,
    periods: &ReportingPeriods,
) -> BTreeMap<String, PeriodComparison> {
    if !table.tracked_metrics().contains(&metric) {
        return BTreeMap::new();
    }
    rollup_multi(
        project_rows(table, project),
        periods,
        |r: &TargetRecord| {
            Some(
                r.project
                    .clone()
                    .unwrap_or_else(|| UNASSIGNED_PROJECT.to_string()),
            )
        },
        |r: &TargetRecord| r.values(metric),
    )
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CategoryBreakdown {
    pub subtotal: PeriodComparison,
    pub heads: BTreeMap<String, PeriodComparison>,
}

/// Expense head -> category -> grand total.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExpenseBreakdown {
    pub categories: BTreeMap<String, CategoryBreakdown>,
    pub total: PeriodComparison,
}

/// Per-head rollups. Every head in the table is reported, with zeros for
/// periods in which it has no rows. Rows without a head are reported under
/// [`UNNAMED_EXPENSE`], which has no category mapping.
pub fn rollup_expense_heads(
    table: &ExpenseTable,
    periods: &ReportingPeriods,
) -> BTreeMap<String, PeriodComparison> {
    let mut heads: BTreeMap<String, PeriodComparison> = table
        .expense_heads()
        .into_iter()
        .map(|head| (head, PeriodComparison::default()))
        .collect();
    if table.records.iter().any(|r| r.expense.is_none()) {
        heads.insert(UNNAMED_EXPENSE.to_string(), PeriodComparison::default());
    }

    let sums = rollup_multi(
        &table.records,
        periods,
        |r: &ExpenseRecord| {
            Some(
                r.expense
                    .clone()
                    .unwrap_or_else(|| UNNAMED_EXPENSE.to_string()),
            )
        },
        |r: &ExpenseRecord| (r.target, r.actual),
    );
    heads.extend(sums);
    heads
}

/// Folds head rollups into category subtotals and a grand total. Heads with
/// no entry in `category_map` land in [`UNCATEGORIZED`].
pub fn fold_expense_hierarchy(
    heads: &BTreeMap<String, PeriodComparison>,
    category_map: &BTreeMap<String, String>,
) -> ExpenseBreakdown {
    let mut categories: BTreeMap<String, CategoryBreakdown> = BTreeMap::new();
    for (head, comparison) in heads {
        let category = category_map
            .get(head)
            .map(String::as_str)
            .unwrap_or(UNCATEGORIZED);
        categories
            .entry(category.to_string())
            .or_default()
            .heads
            .insert(head.clone(), *comparison);
    }

    for category in categories.values_mut() {
        category.subtotal = category.heads.values().sum();
    }
    let total = categories.values().map(|c| &c.subtotal).sum();

    ExpenseBreakdown { categories, total }
}

pub fn rollup_expenses(table: &ExpenseTable, periods: &ReportingPeriods) -> ExpenseBreakdown {
    fold_expense_hierarchy(&rollup_expense_heads(table, periods), &table.category_map())
}

/// Inflow minus total outflow, per period.
pub fn net_cash_flow(inflow: &PeriodComparison, outflow: &PeriodComparison) -> PeriodComparison {
    inflow.net_of(outflow)
}

/// Checks that heads sum to their category subtotal, subtotals sum to the
/// grand total, and every delta equals `achieved - target`.
pub fn verify_rollup_integrity(breakdown: &ExpenseBreakdown, tolerance: f64) -> Result<()> {
    for kind in PeriodKind::ALL {
        let mut category_sum = Rollup::default();
        for (name, category) in &breakdown.categories {
            let head_sum: Rollup = category.heads.values().map(|c| c.get(kind)).sum();
            check_rollup(name, kind, category.subtotal.get(kind), &head_sum, tolerance)?;
            category_sum.absorb(category.subtotal.get(kind));
        }
        check_rollup("Total", kind, breakdown.total.get(kind), &category_sum, tolerance)?;
    }
    Ok(())
}

fn check_rollup(
    scope: &str,
    period: PeriodKind,
    expected: &Rollup,
    actual: &Rollup,
    tolerance: f64,
) -> Result<()> {
    let pairs = [
        (expected.target, actual.target),
        (expected.achieved, actual.achieved),
        (expected.achieved - expected.target, expected.delta),
    ];
    for (expected, actual) in pairs {
        if (expected - actual).abs() > tolerance {
            return Err(DashboardError::RollupIntegrityViolation {
                scope: scope.to_string(),
                period,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// A month in the fiscal-year breakdown; `None` when no rows fall in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyRollup {
    pub month_start: NaiveDate,
    pub rollup: Option<Rollup>,
}

pub fn rollup_by_month<'a, R, I, M>(rows: I, months: &[NaiveDate], measure: M) -> Vec<MonthlyRollup>
where
    R: PeriodRow + 'a,
    I: IntoIterator<Item = &'a R>,
    M: Fn(&R) -> (Option<f64>, Option<f64>),
{
    let mut sums: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for row in rows {
        let start = row.period_start();
        if !months.contains(&start) {
            continue;
        }
        let (target, achieved) = measure(row);
        let entry = sums.entry(start).or_insert((0.0, 0.0));
        entry.0 += target.unwrap_or(0.0);
        entry.1 += achieved.unwrap_or(0.0);
    }

    months
        .iter()
        .map(|&month_start| MonthlyRollup {
            month_start,
            rollup: sums
                .get(&month_start)
                .map(|&(target, achieved)| Rollup::new(target, achieved)),
        })
        .collect()
}

/// Monthly rollups of each tracked metric across `months`.
pub fn rollup_metrics_by_month(
    table: &TargetTable,
    project: Option<&str>,
    metrics: &[TargetMetric],
    months: &[NaiveDate],
) -> BTreeMap<TargetMetric, Vec<MonthlyRollup>> {
    tracked(table, metrics)
        .into_iter()
        .map(|metric| {
            let cells = rollup_by_month(project_rows(table, project), months, |r: &TargetRecord| {
                r.values(metric)
            });
            (metric, cells)
        })
        .collect()
}
