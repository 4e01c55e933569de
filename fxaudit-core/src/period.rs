//! Interval utility — half-open `[start, end)` period bounds in UTC.
//!
//! Every slicing operation in the workspace goes through these constructors;
//! no other module does date arithmetic for period bounds. The half-open
//! convention means a bar or gap landing exactly on `end` belongs to the
//! next period, never to both.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::MinuteBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Year,
    Quarter,
    Month,
}

/// A half-open slicing window `[start, end)` for one year, quarter, or month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub kind: PeriodKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Human label used in artifact paths: `2024`, `2024Q1`, `2024-01`.
    pub label: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("quarter must be 1..=4, got {0}")]
    InvalidQuarter(u32),
    #[error("month must be 1..=12, got {0}")]
    InvalidMonth(u32),
    #[error("year {0} is out of calendar range")]
    InvalidYear(i32),
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>, PeriodError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is always valid").and_utc())
        .ok_or(PeriodError::InvalidYear(year))
}

impl Period {
    /// `[Jan 1 00:00, next Jan 1 00:00)` — leap years need no special case.
    pub fn year(year: i32) -> Result<Self, PeriodError> {
        Ok(Self {
            kind: PeriodKind::Year,
            start: month_start(year, 1)?,
            end: month_start(year + 1, 1)?,
            label: format!("{year}"),
        })
    }

    /// Quarter `q` of `year`; Q4 ends at the next year's Jan 1.
    pub fn quarter(year: i32, q: u32) -> Result<Self, PeriodError> {
        if !(1..=4).contains(&q) {
            return Err(PeriodError::InvalidQuarter(q));
        }
        let start_month = 3 * (q - 1) + 1;
        let (end_year, end_month) = if q == 4 {
            (year + 1, 1)
        } else {
            (year, start_month + 3)
        };
        Ok(Self {
            kind: PeriodKind::Quarter,
            start: month_start(year, start_month)?,
            end: month_start(end_year, end_month)?,
            label: format!("{year}Q{q}"),
        })
    }

    /// Month `m` of `year`; December ends at the next year's Jan 1.
    pub fn month(year: i32, m: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&m) {
            return Err(PeriodError::InvalidMonth(m));
        }
        let (end_year, end_month) = if m == 12 { (year + 1, 1) } else { (year, m + 1) };
        Ok(Self {
            kind: PeriodKind::Month,
            start: month_start(year, m)?,
            end: month_start(end_year, end_month)?,
            label: format!("{year}-{m:02}"),
        })
    }

    /// The quarter that contains the given month window.
    pub fn enclosing_quarter(year: i32, m: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&m) {
            return Err(PeriodError::InvalidMonth(m));
        }
        Self::quarter(year, (m - 1) / 3 + 1)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn year_number(&self) -> i32 {
        self.start.year()
    }

    /// Slice a sorted bar series down to this period's bars. Binary search on
    /// both bounds, so cross-period bars are never even inspected.
    pub fn slice<'a>(&self, bars: &'a [MinuteBar]) -> &'a [MinuteBar] {
        let lo = bars.partition_point(|b| b.timestamp_utc < self.start);
        let hi = bars.partition_point(|b| b.timestamp_utc < self.end);
        &bars[lo..hi]
    }
}
