use chrono::{Datelike, Days, Months, NaiveDate};

/// Full English month names; abbreviations are not accepted.
pub const VALID_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Calendar month in which the fiscal year begins (April).
pub const FISCAL_YEAR_START_MONTH: u32 = 4;

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    first_day_of_month(date) + Months::new(1) - Days::new(1)
}

pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    first_day_of_month(date) + Months::new(1)
}

/// Returns every first-of-month date from the month containing `start`
/// through the month containing `end`, inclusive.
pub fn get_month_starts_in_period(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();

    let mut current = first_day_of_month(start);
    while current <= end {
        dates.push(current);
        current = next_month_start(current);
    }

    dates
}

/// Maps a normalized (title-cased) month name to its 1-based number.
pub fn month_number(name: &str) -> Option<u32> {
    VALID_MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|idx| idx as u32 + 1)
}

/// First day of the named month in `year`, or `None` if the name is not a
/// full month name.
pub fn month_start(month_name: &str, year: i32) -> Option<NaiveDate> {
    let month = month_number(month_name)?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Strip, lower-case and collapse internal whitespace runs.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the
/// rest, so "hotel & travel EXPENSES" becomes "Hotel & Travel Expenses".
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Best-effort numeric parse for spreadsheet cells.
///
/// - Trims whitespace and strips thousands separators.
/// - Rejects non-finite results ("NaN", "inf").
/// - Returns `None` for anything that cannot be parsed; never fails.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a year cell, accepting spreadsheet floats such as "2024.0".
pub fn parse_year(raw: &str) -> Option<i32> {
    let value = parse_number(raw)?;
    if value.fract() != 0.0 || value < 1.0 || value > 9999.0 {
        return None;
    }
    Some(value as i32)
}
