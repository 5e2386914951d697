use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid time window '{0}', expected e.g. 4w, 3m, 1y or all")]
pub struct WindowParseError(pub String);

/// How far back a chart or summary looks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeWindow {
    Weeks(u32),
    Months(u32),
    Years(u32),
    All,
}

impl Default for TimeWindow {
    fn default() -> Self {
        TimeWindow::Weeks(4)
    }
}

impl TimeWindow {
    /// Dates must be strictly after the cutoff to fall inside the window.
    /// `None` means no cutoff.
    ///
    /// Month and year steps clamp to the end of the month, so one month
    /// before 2024-03-31 is 2024-02-29.
    pub fn cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        match *self {
            TimeWindow::Weeks(n) => today.checked_sub_signed(Duration::weeks(n as i64)),
            TimeWindow::Months(n) => today.checked_sub_months(Months::new(n)),
            TimeWindow::Years(n) => today.checked_sub_months(Months::new(n.saturating_mul(12))),
            TimeWindow::All => None,
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self.cutoff(today) {
            Some(cutoff) => date > cutoff,
            None => true,
        }
    }
}

impl FromStr for TimeWindow {
    type Err = WindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower == "all" {
            return Ok(TimeWindow::All);
        }

        let err = || WindowParseError(s.to_string());
        let unit = lower.chars().last().ok_or_else(err)?;
        let count: u32 = lower[..lower.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| err())?;
        if count == 0 {
            return Err(err());
        }

        match unit {
            'w' => Ok(TimeWindow::Weeks(count)),
            'm' => Ok(TimeWindow::Months(count)),
            'y' => Ok(TimeWindow::Years(count)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = WindowParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeWindow> for String {
    fn from(window: TimeWindow) -> Self {
        window.to_string()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Weeks(n) => write!(f, "{}w", n),
            TimeWindow::Months(n) => write!(f, "{}m", n),
            TimeWindow::Years(n) => write!(f, "{}y", n),
            TimeWindow::All => write!(f, "all"),
        }
    }
}
