//! Relative date parsing and inclusive date ranges

use crate::utils::error::{GrabError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

const DATE_FORMAT: &str = "%Y%m%d";

/// Parse `YYYYMMDD`, `now`, `today`, `yesterday` or
/// `(now|today)[+-]N(day|week|month|year)[s]`
pub fn date_from_str(s: &str) -> Result<NaiveDate> {
    date_from_str_relative_to(s, Utc::now().date_naive())
}

pub(crate) fn date_from_str_relative_to(s: &str, today: NaiveDate) -> Result<NaiveDate> {
    static RELATIVE: OnceLock<Regex> = OnceLock::new();
    let relative = RELATIVE.get_or_init(|| {
        Regex::new(r"^(?:now|today)(?P<sign>[+-])(?P<amount>\d+)(?P<unit>day|week|month|year)s?$")
            .expect("relative date regex")
    });

    let s = s.trim();
    match s {
        "now" | "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Some(caps) = relative.captures(s) {
        let amount: i64 = caps["amount"]
            .parse()
            .map_err(|_| GrabError::InvalidConfig(format!("invalid date {:?}", s)))?;
        let days = match &caps["unit"] {
            "week" => amount * 7,
            "month" => amount * 30,
            "year" => amount * 365,
            _ => amount,
        };
        let delta = Duration::days(days);
        return Ok(if &caps["sign"] == "-" {
            today - delta
        } else {
            today + delta
        });
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| GrabError::InvalidConfig(format!("invalid date {:?}: {}", s, e)))
}

/// `YYYYMMDD` for a Unix timestamp, in UTC
pub fn timestamp_to_date(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.format(DATE_FORMAT).to_string())
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Missing bounds are open
    pub fn new(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = match start {
            Some(s) => date_from_str(s)?,
            None => NaiveDate::MIN,
        };
        let end = match end {
            Some(s) => date_from_str(s)?,
            None => NaiveDate::MAX,
        };
        if start > end {
            return Err(GrabError::InvalidConfig(format!(
                "Date range: \"{}\" , the start date must be before the end date",
                DateRange { start, end }
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day
    pub fn day(day: &str) -> Result<Self> {
        Self::new(Some(day), Some(day))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Membership test for a `YYYYMMDD` string
    pub fn contains_str(&self, date: &str) -> Result<bool> {
        Ok(self.contains(date_from_str(date)?))
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}
