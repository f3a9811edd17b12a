use crate::engine::{
    net_cash_flow, rollup_by_project, rollup_expenses, rollup_metrics_by_month,
    rollup_metrics_multi, ExpenseBreakdown, MonthlyRollup, PeriodComparison,
};
use crate::error::{DashboardError, Result};
use crate::period::{FiscalYearCalendar, ReportingPeriods};
use crate::schema::{
    ExpenseTable, NumericCoercionWarning, TargetColumnSet, TargetMetric, TargetTable,
};
use crate::utils::title_case;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Project selector value meaning "no project filter".
pub const ALL_PROJECTS: &str = "All Projects";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DashboardConfig {
    /// As-of date; periods cover the months completed before it.
    pub today: NaiveDate,

    /// Restricts the target sections to one project. `None` or
    /// `"All Projects"` selects every project.
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub target_columns: TargetColumnSet,
}

impl DashboardConfig {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            project: None,
            target_columns: TargetColumnSet::default(),
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_target_columns(mut self, target_columns: TargetColumnSet) -> Self {
        self.target_columns = target_columns;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(project) = &self.project {
            if project.trim().is_empty() {
                return Err(DashboardError::InvalidConfig(
                    "project filter must not be blank; omit it to select all projects"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The project filter in the same title case the normalizer applies to
    /// project names.
    pub fn project_filter(&self) -> Option<String> {
        self.project
            .as_deref()
            .map(title_case)
            .filter(|p| p != ALL_PROJECTS)
    }
}

/// Every tracked metric for the selected project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TargetPerformance {
    pub project: String,
    pub metrics: BTreeMap<TargetMetric, PeriodComparison>,
}

/// DM inflows per project plus a total row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProjectInflowSummary {
    pub projects: BTreeMap<String, PeriodComparison>,
    pub total: PeriodComparison,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CashFlowStatement {
    /// DM inflows across all projects.
    pub inflow: PeriodComparison,
    pub expenses: ExpenseBreakdown,
    /// Grand total of `expenses`.
    pub outflow: PeriodComparison,
    pub net_cash_flow: PeriodComparison,
}

/// One cell per fiscal-year month; months with no rows are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyBreakdown {
    pub fiscal_year: String,
    pub months: Vec<NaiveDate>,
    pub metrics: BTreeMap<TargetMetric, Vec<MonthlyRollup>>,
}

/// Fully computed dashboard sections, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Dashboard {
    pub as_of: NaiveDate,
    pub periods: ReportingPeriods,
    pub performance: TargetPerformance,
    pub inflow_by_project: ProjectInflowSummary,
    pub cash_flow: CashFlowStatement,
    pub monthly: MonthlyBreakdown,
    #[serde(default)]
    pub warnings: Vec<NumericCoercionWarning>,
}

impl Dashboard {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Dashboard)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

pub fn performance_summary(
    table: &TargetTable,
    project: Option<&str>,
    periods: &ReportingPeriods,
) -> TargetPerformance {
    TargetPerformance {
        project: project.unwrap_or(ALL_PROJECTS).to_string(),
        metrics: rollup_metrics_multi(table, project, &TargetMetric::ALL, periods),
    }
}

pub fn inflow_by_project(
    table: &TargetTable,
    project: Option<&str>,
    periods: &ReportingPeriods,
) -> ProjectInflowSummary {
    let projects = rollup_by_project(table, project, TargetMetric::DmInflows, periods);
    let total = projects.values().sum();
    ProjectInflowSummary { projects, total }
}

pub fn cash_flow_statement(
    target: &TargetTable,
    expense: &ExpenseTable,
    periods: &ReportingPeriods,
) -> CashFlowStatement {
    let inflow = rollup_metrics_multi(target, None, &[TargetMetric::DmInflows], periods)
        .remove(&TargetMetric::DmInflows)
        .unwrap_or_default();
    let expenses = rollup_expenses(expense, periods);
    let outflow = expenses.total;
    let net_cash_flow = net_cash_flow(&inflow, &outflow);

    CashFlowStatement {
        inflow,
        expenses,
        outflow,
        net_cash_flow,
    }
}

pub fn monthly_breakdown(
    table: &TargetTable,
    project: Option<&str>,
    calendar: &FiscalYearCalendar,
) -> MonthlyBreakdown {
    MonthlyBreakdown {
        fiscal_year: calendar.label(),
        months: calendar.months.clone(),
        metrics: rollup_metrics_by_month(table, project, &TargetMetric::ALL, &calendar.months),
    }
}

/// Assembles every section from already-normalized tables.
pub fn build_dashboard(
    target: &TargetTable,
    expense: &ExpenseTable,
    config: &DashboardConfig,
) -> Dashboard {
    let periods = ReportingPeriods::as_of(config.today);
    let calendar = FiscalYearCalendar::for_today(config.today);
    let project = config.project_filter();
    let project = project.as_deref();

    let warnings = target
        .warnings
        .iter()
        .chain(&expense.warnings)
        .cloned()
        .collect();

    Dashboard {
        as_of: config.today,
        periods,
        performance: performance_summary(target, project, &periods),
        inflow_by_project: inflow_by_project(target, project, &periods),
        cash_flow: cash_flow_statement(target, expense, &periods),
        monthly: monthly_breakdown(target, project, &calendar),
        warnings,
    }
}
