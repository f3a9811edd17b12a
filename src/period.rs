//! Fiscal period boundaries relative to an as-of date.
//!
//! Reporting always covers fully completed calendar months: MTD is the last
//! completed month, QTD runs from the start of the fiscal quarter containing
//! it, and YTD from the April 1st that opens its fiscal year.

use crate::utils::{
    first_day_of_month, get_month_starts_in_period, last_day_of_month, FISCAL_YEAR_START_MONTH,
};
use chrono::{Datelike, Days, Months, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum PeriodKind {
    #[serde(rename = "MTD")]
    Mtd,
    #[serde(rename = "QTD")]
    Qtd,
    #[serde(rename = "YTD")]
    Ytd,
}

impl PeriodKind {
    pub const ALL: [PeriodKind; 3] = [PeriodKind::Mtd, PeriodKind::Qtd, PeriodKind::Ytd];

    pub fn label(&self) -> &'static str {
        match self {
            PeriodKind::Mtd => "MTD",
            PeriodKind::Qtd => "QTD",
            PeriodKind::Ytd => "YTD",
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Period {
    pub kind: PeriodKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// The "today" the range was derived from.
    pub as_of: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A date inside the last fully completed calendar month before `today`.
pub fn last_completed_month(today: NaiveDate) -> NaiveDate {
    first_day_of_month(today) - Days::new(1)
}

/// First day of the fiscal quarter (Apr-Jun, Jul-Sep, Oct-Dec, Jan-Mar)
/// containing `date`.
pub fn fiscal_quarter_start(date: NaiveDate) -> NaiveDate {
    let offset = (date.month0() + 12 - (FISCAL_YEAR_START_MONTH - 1)) % 3;
    first_day_of_month(date) - Months::new(offset)
}

/// April 1st of the fiscal year containing `date`.
pub fn fiscal_year_start(date: NaiveDate) -> NaiveDate {
    first_day_of_month(date) - Months::new(fiscal_month_offset(date))
}

/// Number of months `date` lies after the start of its fiscal year.
fn fiscal_month_offset(date: NaiveDate) -> u32 {
    (date.month0() + 12 - (FISCAL_YEAR_START_MONTH - 1)) % 12
}

/// MTD, QTD and YTD ranges for one as-of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportingPeriods {
    pub as_of: NaiveDate,
    pub mtd: Period,
    pub qtd: Period,
    pub ytd: Period,
}

impl ReportingPeriods {
    pub fn as_of(today: NaiveDate) -> Self {
        let last_month = last_completed_month(today);
        let month_end = last_day_of_month(last_month);

        let mtd = Period {
            kind: PeriodKind::Mtd,
            start: first_day_of_month(last_month),
            end: month_end,
            as_of: today,
        };
        let qtd = Period {
            kind: PeriodKind::Qtd,
            start: fiscal_quarter_start(last_month),
            end: month_end,
            as_of: today,
        };
        let ytd = Period {
            kind: PeriodKind::Ytd,
            start: fiscal_year_start(last_month),
            end: month_end,
            as_of: today,
        };

        Self {
            as_of: today,
            mtd,
            qtd,
            ytd,
        }
    }

    pub fn get(&self, kind: PeriodKind) -> &Period {
        match kind {
            PeriodKind::Mtd => &self.mtd,
            PeriodKind::Qtd => &self.qtd,
            PeriodKind::Ytd => &self.ytd,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Period> {
        [&self.mtd, &self.qtd, &self.ytd].into_iter()
    }
}

/// The twelve months of the fiscal year shown in the monthly breakdown.
///
/// Anchored on `today` itself rather than on the last completed month. In
/// April the previous fiscal year is shown, since the new one has no
/// completed month yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FiscalYearCalendar {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub months: Vec<NaiveDate>,
}

impl FiscalYearCalendar {
    pub fn for_today(today: NaiveDate) -> Self {
        let this_month = today.month();
        // April itself still belongs to the previous table.
        let start_year = if this_month > FISCAL_YEAR_START_MONTH {
            today.year()
        } else {
            today.year() - 1
        };

        let months_back = (today.year() - start_year) * 12 + this_month as i32
            - FISCAL_YEAR_START_MONTH as i32;
        let start = first_day_of_month(today) - Months::new(months_back.unsigned_abs());
        let end = start + Months::new(12) - Days::new(1);

        Self {
            start,
            end,
            months: get_month_starts_in_period(start, end),
        }
    }

    pub fn label(&self) -> String {
        format!(
            "FY {}-{}",
            self.start.format("%b %Y"),
            self.end.format("%b %Y")
        )
    }
}
