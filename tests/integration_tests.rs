use aop_dashboard::*;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn write_csv(dir: &Path, name: &str, headers: &[&str], rows: &[&[&str]]) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(*row)?;
    }
    writer.flush()?;
    Ok(path)
}

const TARGET_HEADERS: &[&str] = &[
    "Project",
    "Month",
    "Year",
    "DM Inflow Actual",
    "DM Inflow Target",
    "Sales Target",
    "Sales Achieved",
    "Unit Target",
    "Unit Achieved",
    "Collection Target",
    "Collection Achieved",
];

const TARGET_ROWS: &[&[&str]] = &[
    &["Skyline", "October", "2025", "500", "450", "2000", "2100", "4", "5", "800", "700"],
    &["skyline", "SEPTEMBER", "2025", "300", "350", "1500", "1200", "3", "2", "600", "650"],
    &["Harbor View", "October", "2025", "250", "300", "1000", "900", "2", "2", "400", "420"],
    &["Harbor View", "April", "2025", "100", "100", "500", "500", "1", "1", "200", "200"],
    &["Skyline", "March", "2025", "999", "999", "999", "999", "9", "9", "999", "999"],
    &["Harbor View", "November", "2025", "50", "50", "100", "100", "1", "1", "10", "10"],
];

const EXPENSE_HEADERS: &[&str] = &["Expense Head", "Category", "Month", "Year", "Actual", "Target"];

const EXPENSE_ROWS: &[&[&str]] = &[
    &["Salaries", "People", "October", "2025", "1,200", "1000"],
    &["salaries", "people", "September", "2025", "1000", "1000"],
    &["Office Rent", "Facilities", "October", "2025", "300", "300"],
    &["Marketing", "", "August", "2025", "150", "100"],
    &["Office Rent", "Facilities", "March", "2025", "300", "300"],
];

fn fixtures(dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let targets = write_csv(dir, "targets.csv", TARGET_HEADERS, TARGET_ROWS)?;
    let expenses = write_csv(dir, "expenses.csv", EXPENSE_HEADERS, EXPENSE_ROWS)?;
    Ok((targets, expenses))
}

#[test]
fn test_real_estate_portfolio_from_csv() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (targets, expenses) = fixtures(dir.path())?;
    let config = DashboardConfig::new(date(2025, 11, 20));

    let dashboard = DashboardProcessor::process_files(&targets, &expenses, &config)?;

    assert_eq!(dashboard.periods.mtd.start, date(2025, 10, 1));
    assert_eq!(dashboard.periods.qtd.start, date(2025, 10, 1));
    assert_eq!(dashboard.periods.ytd.start, date(2025, 4, 1));

    let inflow = &dashboard.performance.metrics[&TargetMetric::DmInflows];
    assert_eq!(inflow.mtd, Rollup::new(750.0, 750.0));
    assert_eq!(inflow.ytd, Rollup::new(1200.0, 1150.0));

    let units = &dashboard.performance.metrics[&TargetMetric::SalesUnit];
    assert_eq!(units.ytd, Rollup::new(10.0, 10.0));

    let projects = &dashboard.inflow_by_project.projects;
    assert_eq!(
        projects.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Harbor View", "Skyline"]
    );
    assert_eq!(projects["Skyline"].ytd, Rollup::new(800.0, 800.0));
    assert_eq!(projects["Harbor View"].ytd, Rollup::new(400.0, 350.0));
    assert_eq!(dashboard.inflow_by_project.total.ytd, inflow.ytd);

    let cash = &dashboard.cash_flow;
    assert_eq!(cash.outflow.mtd, Rollup::new(1300.0, 1500.0));
    assert_eq!(cash.outflow.ytd, Rollup::new(2400.0, 2650.0));
    assert_eq!(cash.net_cash_flow.mtd, Rollup::new(-550.0, -750.0));
    assert_eq!(cash.net_cash_flow.mtd.delta, -200.0);

    let uncategorized = &cash.expenses.categories[UNCATEGORIZED];
    assert_eq!(uncategorized.heads["Marketing"].mtd, Rollup::default());
    assert_eq!(uncategorized.heads["Marketing"].ytd, Rollup::new(100.0, 150.0));
    assert_eq!(cash.expenses.categories["People"].heads.len(), 1);

    Ok(())
}

#[test]
fn test_monthly_breakdown_leaves_gaps_blank() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (targets, expenses) = fixtures(dir.path())?;
    let config = DashboardConfig::new(date(2025, 11, 20));

    let dashboard = DashboardProcessor::process_files(&targets, &expenses, &config)?;
    let monthly = &dashboard.monthly;

    assert_eq!(monthly.fiscal_year, "FY Apr 2025-Mar 2026");
    assert_eq!(monthly.months.len(), 12);

    let sales = &monthly.metrics[&TargetMetric::SalesValue];
    let filled: Vec<bool> = sales.iter().map(|cell| cell.rollup.is_some()).collect();
    assert_eq!(
        filled,
        vec![true, false, false, false, false, true, true, true, false, false, false, false]
    );
    assert_eq!(sales[6].rollup, Some(Rollup::new(3000.0, 3000.0)));
    // The current partial month shows in the calendar but not in MTD.
    assert_eq!(sales[7].month_start, date(2025, 11, 1));

    Ok(())
}

#[test]
fn test_project_filter() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (targets, expenses) = fixtures(dir.path())?;
    let config = DashboardConfig::from_json(r#"{"today": "2025-11-20", "project": "harbor view"}"#)?;

    let dashboard = DashboardProcessor::process_files(&targets, &expenses, &config)?;

    assert_eq!(dashboard.performance.project, "Harbor View");
    let inflow = &dashboard.performance.metrics[&TargetMetric::DmInflows];
    assert_eq!(inflow.ytd, Rollup::new(400.0, 350.0));
    assert_eq!(dashboard.inflow_by_project.projects.len(), 1);
    assert_eq!(dashboard.cash_flow.inflow.ytd, Rollup::new(1200.0, 1150.0));

    Ok(())
}

#[test]
fn test_rollup_integrity_holds_across_as_of_dates() -> anyhow::Result<()> {
    let targets = RawTable::from_rows(TARGET_HEADERS, &[
        ["Skyline", "October", "2025", "500.25", "450.1", "0", "0", "0", "0", "0", "0"],
    ]);
    let expenses = RawTable::from_rows(
        EXPENSE_HEADERS,
        &[
            ["Salaries", "People", "April", "2025", "1000.1", "999.9"],
            ["Bonus", "People", "June", "2025", "200.3", "250.7"],
            ["Rent", "Facilities", "September", "2025", "300.33", "300.01"],
            ["Power", "Facilities", "January", "2026", "45.45", "40.4"],
            ["Travel", "", "December", "2025", "12.5", "20.25"],
        ],
    );

    let mut today = date(2025, 4, 1);
    while today <= date(2026, 4, 30) {
        let config = DashboardConfig::new(today);
        let dashboard = process_with_verification(&targets, &expenses, &config, 1e-6)?;
        let cash = &dashboard.cash_flow;

        for kind in PeriodKind::ALL {
            let heads: f64 = cash
                .expenses
                .categories
                .values()
                .flat_map(|c| c.heads.values())
                .map(|h| h.get(kind).achieved)
                .sum();
            let subtotals: f64 = cash
                .expenses
                .categories
                .values()
                .map(|c| c.subtotal.get(kind).achieved)
                .sum();
            assert!((heads - subtotals).abs() < 1e-6);
            assert!((subtotals - cash.outflow.get(kind).achieved).abs() < 1e-6);

            let net = cash.net_cash_flow.get(kind);
            assert_eq!(net.delta, net.achieved - net.target);
        }

        today = today + chrono::Days::new(9);
    }

    Ok(())
}

#[test]
fn test_blank_keys_stay_in_totals() -> anyhow::Result<()> {
    let targets = RawTable::from_rows(TARGET_HEADERS, &[
        ["Tower A", "June", "2025", "1000", "1000", "0", "0", "0", "0", "0", "0"],
        ["", "June", "2025", "500", "500", "0", "0", "0", "0", "0", "0"],
    ]);
    let expenses = RawTable::from_rows(
        EXPENSE_HEADERS,
        &[
            ["Rent", "Office", "June", "2025", "100", "80"],
            ["", "Office", "June", "2025", "400", "400"],
        ],
    );

    let config = DashboardConfig::new(date(2025, 7, 10));
    let dashboard = process_with_verification(&targets, &expenses, &config, 1e-9)?;

    let inflow = &dashboard.performance.metrics[&TargetMetric::DmInflows];
    assert_eq!(inflow.mtd, Rollup::new(1500.0, 1500.0));
    assert_eq!(dashboard.inflow_by_project.total, *inflow);
    assert!(dashboard.inflow_by_project.projects.contains_key(UNASSIGNED_PROJECT));

    let cash = &dashboard.cash_flow;
    assert_eq!(cash.outflow.mtd, Rollup::new(480.0, 500.0));
    assert_eq!(cash.net_cash_flow.mtd, Rollup::new(1020.0, 1000.0));
    assert!(cash.expenses.categories[UNCATEGORIZED].heads.contains_key(UNNAMED_EXPENSE));

    Ok(())
}

#[test]
fn test_every_invalid_month_is_reported() {
    let targets = RawTable::from_rows(TARGET_HEADERS, &[
        ["Skyline", "jan", "2025", "1", "1", "1", "1", "1", "1", "1", "1"],
        ["Skyline", "FEBRUARY", "2025", "1", "1", "1", "1", "1", "1", "1", "1"],
        ["Skyline", "Marc", "2025", "1", "1", "1", "1", "1", "1", "1", "1"],
        ["Skyline", "marc", "2025", "1", "1", "1", "1", "1", "1", "1", "1"],
    ]);
    let expenses = RawTable::from_rows(EXPENSE_HEADERS, &[["Rent", "Office", "March", "2025", "1", "1"]]);

    let err = process_dashboard(&targets, &expenses, &DashboardConfig::new(date(2025, 5, 1)))
        .unwrap_err();
    match err {
        DashboardError::InvalidMonth { table, values } => {
            assert_eq!(table, TableKind::Target);
            assert_eq!(values, vec!["Jan", "Marc"]);
        }
        other => panic!("expected InvalidMonth, got {other}"),
    }
}

#[test]
fn test_unparseable_period_fails_before_rollups() {
    let targets = RawTable::from_rows(TARGET_HEADERS, &[
        ["Skyline", "May", "2025", "1", "1", "1", "1", "1", "1", "1", "1"],
    ]);
    let expenses = RawTable::from_rows(
        EXPENSE_HEADERS,
        &[
            ["Rent", "Office", "May", "2025", "1", "1"],
            ["Rent", "Office", "June", "", "1", "1"],
            ["Rent", "Office", "", "2025", "1", "1"],
        ],
    );

    let err = process_dashboard(&targets, &expenses, &DashboardConfig::new(date(2025, 7, 1)))
        .unwrap_err();
    assert!(matches!(
        err,
        DashboardError::PeriodDerivation {
            table: TableKind::Expense,
            ref rows,
        } if rows == &vec![2, 3]
    ));
    assert!(err.to_string().contains("rows 2, 3"));
}

#[test]
fn test_missing_columns_name_the_table() {
    let targets = RawTable::from_rows(&["Project", "Month", "Year"], &[["Skyline", "May", "2025"]]);
    let expenses = RawTable::from_rows(EXPENSE_HEADERS, &[["Rent", "Office", "May", "2025", "1", "1"]]);

    let err = process_dashboard(&targets, &expenses, &DashboardConfig::new(date(2025, 7, 1)))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Target table is missing columns"));
    assert!(message.contains("dm inflow actual"));
}

#[test]
fn test_unsupported_upload_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (_, expenses) = fixtures(dir.path())?;
    let pdf = dir.path().join("targets.pdf");
    std::fs::write(&pdf, b"%PDF-1.7")?;

    let result =
        DashboardProcessor::process_files(&pdf, &expenses, &DashboardConfig::new(date(2025, 7, 1)));
    assert!(matches!(result, Err(DashboardError::UnsupportedFileFormat(_))));

    Ok(())
}

#[test]
fn test_latin1_expense_upload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (targets, _) = fixtures(dir.path())?;
    let expenses = dir.path().join("expenses.csv");
    std::fs::write(
        &expenses,
        b"Expense,Expense Category,Month,Year,Actual,Target\nCaf\xe9 Supplies,Office,October,2025,40,50\n",
    )?;

    let dashboard =
        DashboardProcessor::process_files(&targets, &expenses, &DashboardConfig::new(date(2025, 11, 20)))?;
    let office = &dashboard.cash_flow.expenses.categories["Office"];
    assert_eq!(office.heads["Caf\u{e9} Supplies"].mtd, Rollup::new(50.0, 40.0));

    Ok(())
}

#[test]
fn test_schema_generation() {
    let schema_json = Dashboard::schema_as_json().unwrap();
    assert!(schema_json.contains("performance"));
    assert!(schema_json.contains("cash_flow"));
    assert!(schema_json.contains("monthly"));
    println!("Generated schema:\n{}", schema_json);
}
