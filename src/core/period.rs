use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{AppError, Result};

/// First calendar month of a South African tax year (March)
pub const TAX_YEAR_START_MONTH: u32 = 3;

/// A monthly pay period selected by the surrounding application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayPeriod {
    pub year: i32,
    pub month: u32,
}

impl PayPeriod {
    /// Create a validated pay period
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AppError::validation(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        if !(1900..=9999).contains(&year) {
            return Err(AppError::validation(format!("Year out of range: {}", year)));
        }
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> NaiveDate {
        // Validated in `new`; month and year are always in range
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day()
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Calendar year in which the containing tax year starts
    pub fn tax_year_start(&self) -> i32 {
        if self.month >= TAX_YEAR_START_MONTH {
            self.year
        } else {
            self.year - 1
        }
    }

    /// Tax year identifier in `YYYY/YYYY` form, e.g. `2024/2025` for June 2024
    pub fn tax_year_id(&self) -> String {
        let start = self.tax_year_start();
        format!("{}/{}", start, start + 1)
    }

    /// Position within the tax year: March is 1, February is 12
    pub fn tax_year_period(&self) -> u32 {
        (self.month + 12 - TAX_YEAR_START_MONTH) % 12 + 1
    }

    /// The twelve periods of the tax year containing this period, in order
    pub fn tax_year_periods(&self) -> Vec<PayPeriod> {
        let start = self.tax_year_start();
        (0..12)
            .map(|offset| {
                let month = (TAX_YEAR_START_MONTH - 1 + offset) % 12 + 1;
                let year = if month >= TAX_YEAR_START_MONTH { start } else { start + 1 };
                PayPeriod { year, month }
            })
            .collect()
    }

    /// Parse a `YYYY/YYYY` tax year id into its twelve periods
    pub fn periods_of_tax_year(tax_year_id: &str) -> Result<Vec<PayPeriod>> {
        let start = parse_tax_year_start(tax_year_id)?;
        Ok(PayPeriod::new(start, TAX_YEAR_START_MONTH)?.tax_year_periods())
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Parses `YYYY-MM`
impl FromStr for PayPeriod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AppError::validation(format!("Invalid pay period: {}", s));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl From<NaiveDate> for PayPeriod {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

/// Parse the starting calendar year out of a `YYYY/YYYY` tax year id
pub fn parse_tax_year_start(tax_year_id: &str) -> Result<i32> {
    let (start, end) = tax_year_id
        .split_once('/')
        .ok_or_else(|| AppError::validation(format!("Invalid tax year id: {}", tax_year_id)))?;
    let start: i32 = start
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid tax year id: {}", tax_year_id)))?;
    let end: i32 = end
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid tax year id: {}", tax_year_id)))?;
    if end != start + 1 {
        return Err(AppError::validation(format!(
            "Tax year must span consecutive years: {}",
            tax_year_id
        )));
    }
    Ok(start)
}

/// Format a date as ISO 8601 (`YYYY-MM-DD`)
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Format a timestamp as ISO 8601 UTC
pub fn format_iso8601(utc_time: DateTime<Utc>) -> String {
    utc_time.to_rfc3339()
}
