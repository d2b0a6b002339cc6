//! Year-month values and the validated month ranges used to pick
//! time-series snapshots.

use super::error::{FundsError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// First month with daily reports published by the regulator.
pub const EARLIEST_AVAILABLE: YearMonth = YearMonth {
    year: 2005,
    month: 1,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(FundsError::Validation(format!(
                "month {month} out of range in {year:04}{month:02}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(chrono::Local::now().date_naive())
    }

    pub fn next(self) -> Self {
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

    pub fn previous(self) -> Self {
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

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        self.next().first_day().and_then(|d| d.pred_opt())
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = FundsError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(FundsError::Validation(format!(
                "'{s}' is not a YYYYMM value"
            )));
        }
        let year = s[..4]
            .parse()
            .map_err(|_| FundsError::Validation(format!("invalid year in '{s}'")))?;
        let month = s[4..]
            .parse()
            .map_err(|_| FundsError::Validation(format!("invalid month in '{s}'")))?;
        Self::new(year, month)
    }
}

/// An inclusive, validated range of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    start: YearMonth,
    end: YearMonth,
}

impl MonthRange {
    /// Validates a requested range against the publication window
    /// `[EARLIEST_AVAILABLE, today]`. Missing bounds default to `today`.
    pub fn validate(
        start: Option<YearMonth>,
        end: Option<YearMonth>,
        today: YearMonth,
    ) -> Result<Self> {
        let start = start.unwrap_or(today);
        let end = end.unwrap_or(today);

        if start > end {
            return Err(FundsError::Validation(format!(
                "start {start} is after end {end}"
            )));
        }
        if start < EARLIEST_AVAILABLE || end < EARLIEST_AVAILABLE {
            return Err(FundsError::Validation(format!(
                "dates before {EARLIEST_AVAILABLE} are not available"
            )));
        }
        if start > today || end > today {
            return Err(FundsError::Validation(format!(
                "dates after the current month {today} are not available"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> YearMonth {
        self.start
    }

    pub fn end(&self) -> YearMonth {
        self.end
    }

    pub fn months(&self) -> impl Iterator<Item = YearMonth> + use<> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |m| {
            let next = m.next();
            (next <= end).then_some(next)
        })
    }
}
