use aop_dashboard::*;
use chrono::NaiveDate;

/// Usage: `cargo run --example aop_summary [targets.csv expenses.xlsx [YYYY-MM-DD]]`
///
/// Without arguments a small in-memory portfolio is used.
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let today = match args.get(2) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")?,
        None => NaiveDate::from_ymd_opt(2025, 11, 20).ok_or("invalid demo date")?,
    };
    let config = DashboardConfig::new(today);

    let dashboard = match (args.first(), args.get(1)) {
        (Some(targets), Some(expenses)) => {
            DashboardProcessor::process_files(targets, expenses, &config)?
        }
        _ => process_with_verification(&demo_targets(), &demo_expenses(), &config, 1e-6)?,
    };

    println!("📊 AOP Dashboard as of {}\n", dashboard.as_of);
    for period in dashboard.periods.iter() {
        println!("  {}: {} to {}", period.kind, period.start, period.end);
    }

    println!("\n🎯 Performance ({})", dashboard.performance.project);
    for (metric, comparison) in &dashboard.performance.metrics {
        print_row(metric.label(), comparison);
    }

    println!("\n🏗️  DM Inflows by Project");
    for (project, comparison) in &dashboard.inflow_by_project.projects {
        print_row(project, comparison);
    }
    print_row("Total", &dashboard.inflow_by_project.total);

    let cash = &dashboard.cash_flow;
    println!("\n💰 Cash Flow");
    print_row("Total Inflow", &cash.inflow);
    for (category, breakdown) in &cash.expenses.categories {
        print_row(category, &breakdown.subtotal);
        for (head, comparison) in &breakdown.heads {
            print_row(&format!("  {}", head), comparison);
        }
    }
    print_row("Total Outflow", &cash.outflow);
    print_row("Net Cash Flow", &cash.net_cash_flow);

    println!("\n📅 {}", dashboard.monthly.fiscal_year);
    if let Some(cells) = dashboard.monthly.metrics.get(&TargetMetric::DmInflows) {
        for cell in cells {
            match cell.rollup {
                Some(r) => println!(
                    "  {}  {:>12.2} {:>12.2} {:>12.2}",
                    cell.month_start.format("%b %Y"),
                    r.target,
                    r.achieved,
                    r.delta
                ),
                None => println!("  {}", cell.month_start.format("%b %Y")),
            }
        }
    }

    for warning in &dashboard.warnings {
        println!("\n⚠️  {}", warning);
    }

    Ok(())
}

fn print_row(label: &str, comparison: &PeriodComparison) {
    print!("  {:<28}", label);
    for kind in PeriodKind::ALL {
        let r = comparison.get(kind);
        print!(" | {} {:>10.2} {:>10.2} {:>10.2}", kind, r.target, r.achieved, r.delta);
    }
    println!();
}

fn demo_targets() -> RawTable {
    RawTable::from_rows(
        &[
            "Project",
            "Month",
            "Year",
            "DM Inflow Actual",
            "DM Inflow Target",
            "Sales Value Target",
            "Actual Sales Value",
            "Target Sales Unit",
            "Actual Sales Unit",
            "Collection Target",
            "Collection Achieved",
        ],
        &[
            ["Skyline", "April", "2025", "420", "400", "1800", "1750", "4", "4", "700", "690"],
            ["Skyline", "September", "2025", "300", "350", "1500", "1200", "3", "2", "600", "650"],
            ["Skyline", "October", "2025", "500", "450", "2000", "2100", "4", "5", "800", "700"],
            ["Harbor View", "July", "2025", "150", "200", "900", "950", "2", "2", "300", "280"],
            ["Harbor View", "October", "2025", "250", "300", "1000", "900", "2", "2", "400", "420"],
        ],
    )
}

fn demo_expenses() -> RawTable {
    RawTable::from_rows(
        &["Expense", "Expense Category", "Month", "Year", "Actual", "Target"],
        &[
            ["Salaries", "People", "October", "2025", "1200", "1000"],
            ["Salaries", "People", "September", "2025", "1000", "1000"],
            ["Office Rent", "Facilities", "October", "2025", "300", "300"],
            ["Legal Fees", "Legal", "August", "2025", "100", "80"],
            ["Audit", "Legal", "October", "2025", "50", "60"],
            ["Marketing", "", "July", "2025", "150", "100"],
        ],
    )
}
