use crate::error::{MisError, Result};
use chrono::{Datelike, Days, NaiveDate};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical `YYYY-MM` month identifier. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self::from_date)
            .ok_or_else(|| MisError::InvalidPeriod(format!("{:04}-{:02}", year, month)))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .checked_sub_days(Days::new(1))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Every calendar month from `start` to `end`, both included.
    /// Empty when `start` is after `end`.
    pub fn range_inclusive(start: PeriodKey, end: PeriodKey) -> Vec<PeriodKey> {
        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            current = current.next();
        }
        months
    }

    pub fn months_between(start: PeriodKey, end: PeriodKey) -> i32 {
        let year_diff = end.year - start.year;
        let month_diff = end.month as i32 - start.month as i32;
        year_diff * 12 + month_diff
    }

    /// The twelve months of the fiscal year starting in `start_month` of
    /// `fy_start_year` (e.g. April 2024 to March 2025 for `(2024, 4)`).
    pub fn fiscal_year_months(fy_start_year: i32, start_month: u32) -> Result<Vec<PeriodKey>> {
        validate_fiscal_year_start_month(start_month)?;
        let start = PeriodKey::new(fy_start_year, start_month)?;
        let end = fiscal_year_end(start);
        Ok(Self::range_inclusive(start, end))
    }

    /// Calendar year in which the fiscal year containing this month began.
    pub fn fiscal_year_start_year(&self, start_month: u32) -> i32 {
        if self.month >= start_month {
            self.year
        } else {
            self.year - 1
        }
    }
}

fn fiscal_year_end(start: PeriodKey) -> PeriodKey {
    let mut end = start;
    for _ in 0..11 {
        end = end.next();
    }
    end
}

pub fn validate_fiscal_year_start_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(MisError::InvalidFiscalYearStartMonth(month));
    }
    Ok(())
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = MisError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let date = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d")
            .map_err(|_| MisError::InvalidPeriod(s.to_string()))?;
        Ok(Self::from_date(date))
    }
}

impl TryFrom<String> for PeriodKey {
    type Error = MisError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PeriodKey> for String {
    fn from(key: PeriodKey) -> Self {
        key.to_string()
    }
}

impl JsonSchema for PeriodKey {
    fn schema_name() -> String {
        "PeriodKey".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}
