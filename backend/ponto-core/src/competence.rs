// src/competence.rs
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A pay period: one calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Competence {
    year: i32,
    month: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompetenceError {
    #[error("Competence '{0}' is not in YYYY-MM format")]
    Format(String),
    #[error("Month {0} is out of range")]
    Month(u32),
}

impl Competence {
    pub fn new(year: i32, month: u32) -> Result<Self, CompetenceError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CompetenceError::Month(month));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
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

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
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

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Every calendar date of the month, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first_day();
        let last = self.last_day();
        first.iter_days().take_while(move |d| *d <= last)
    }
}

impl fmt::Display for Competence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Competence {
    type Err = CompetenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| CompetenceError::Format(s.to_string()))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(CompetenceError::Format(s.to_string()));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| CompetenceError::Format(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| CompetenceError::Format(s.to_string()))?;
        Competence::new(year, month)
    }
}

impl TryFrom<String> for Competence {
    type Error = CompetenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Competence> for String {
    fn from(value: Competence) -> Self {
        value.to_string()
    }
}
