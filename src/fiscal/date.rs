//! Target emission date and the fiscal timestamp format.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};

/// Fixed offset every rewritten timestamp carries (Brasília, no DST).
pub const FISCAL_OFFSET: &str = "-03:00";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid target date {0:?}: expected DD/MM/YYYY or YYYY-MM-DD")]
pub struct DateError(pub String);

/// A profile's target date plus the wall-clock time stamped alongside it.
/// The time is captured once per batch so every document agrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateStamp {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Parse `DD/MM/YYYY` (as profiles store it) or ISO `YYYY-MM-DD`.
pub fn parse_target_date(raw: &str) -> Result<NaiveDate, DateError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| DateError(raw.to_string()))
}

impl DateStamp {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// Stamp `date` with the current UTC-3 time of day, whole seconds.
    pub fn now(date: NaiveDate) -> Self {
        let local = Utc::now().naive_utc() - Duration::hours(3);
        let time = local.time();
        let time = time
            .with_nanosecond(0)
            .unwrap_or(time);
        Self { date, time }
    }

    /// `YYYY-MM-DDTHH:MM:SS-03:00`
    pub fn timestamp(&self) -> String {
        format!(
            "{}T{}{}",
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M:%S"),
            FISCAL_OFFSET
        )
    }

    /// `YYMM` as used in the access key.
    pub fn year_month(&self) -> String {
        format!("{}{}", self.two_digit_year(), self.month())
    }

    /// `YY`
    pub fn two_digit_year(&self) -> String {
        format!("{:02}", self.date.year().rem_euclid(100))
    }

    /// `MM`
    pub fn month(&self) -> String {
        format!("{:02}", self.date.month())
    }
}
