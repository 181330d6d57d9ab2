//! Calendar helpers for billing
//!
//! - `Timezone`: the utility's local timezone (defaults to Asia/Manila)
//! - `BillingPeriod`: a calendar month, the unit of "one bill per period"
//! - `age_on`: whole-year age used for the senior-citizen discount

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors related to temporal operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemporalError {
    #[error("Invalid time of day: {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    #[error("Invalid billing period: {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("Local time {0} does not exist in the configured timezone")]
    NonexistentLocalTime(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Timezone wrapper for the utility's service area
///
/// Wraps chrono_tz::Tz with custom serialization support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(pub Tz);

impl Serialize for Timezone {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.name())
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tz::from_str(&s)
            .map(Timezone)
            .map_err(|_| serde::de::Error::custom(format!("Invalid timezone: {}", s)))
    }
}

impl FromStr for Timezone {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tz::from_str(s)
            .map(Timezone)
            .map_err(|_| TemporalError::UnknownTimezone(s.to_string()))
    }
}

impl Timezone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    /// Local calendar date of a UTC instant
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.0).date_naive()
    }

    /// Next instant strictly after `now` at which the local clock reads `hour:minute`
    pub fn next_daily_run(
        &self,
        hour: u32,
        minute: u32,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, TemporalError> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or(TemporalError::InvalidTime { hour, minute })?;
        let local_now = now.with_timezone(&self.0);

        let mut date = local_now.date_naive();
        for _ in 0..3 {
            let candidate = date
                .and_time(time)
                .and_local_timezone(self.0)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));

            if let Some(at) = candidate {
                if at > now {
                    return Ok(at);
                }
            }
            date = date
                .checked_add_days(Days::new(1))
                .ok_or_else(|| TemporalError::NonexistentLocalTime(date.to_string()))?;
        }

        Err(TemporalError::NonexistentLocalTime(format!("{} {}", date, time)))
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self(chrono_tz::Asia::Manila)
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, TemporalError> {
        if !(1..=12).contains(&month) {
            return Err(TemporalError::InvalidPeriod { year, month });
        }
        Ok(Self { year, month })
    }

    /// The period a date falls in
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First day of the month
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// First day of the following month (exclusive upper bound)
    pub fn next_first_day(&self) -> Option<NaiveDate> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Whole years between `birthdate` and `on`
///
/// One year is subtracted when the birthday has not yet occurred in the
/// year of `on`. Returns 0 for birthdates after `on`.
pub fn age_on(birthdate: NaiveDate, on: NaiveDate) -> u32 {
    if birthdate > on {
        return 0;
    }
    let mut years = on.year() - birthdate.year();
    if (on.month(), on.day()) < (birthdate.month(), birthdate.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Signed number of days from `from` to `to`
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_and_on_birthday() {
        let birth = date(1964, 10, 17);
        assert_eq!(age_on(birth, date(2024, 10, 16)), 59);
        assert_eq!(age_on(birth, date(2024, 10, 17)), 60);
    }

    #[test]
    fn test_age_of_future_birthdate_is_zero() {
        assert_eq!(age_on(date(2030, 1, 1), date(2024, 1, 1)), 0);
    }

    #[test]
    fn test_billing_period_bounds() {
        let period = BillingPeriod::containing(date(2024, 12, 15));
        assert_eq!(period.first_day(), Some(date(2024, 12, 1)));
        assert_eq!(period.next_first_day(), Some(date(2025, 1, 1)));
        assert!(period.contains(date(2024, 12, 31)));
        assert!(!period.contains(date(2025, 1, 1)));
    }

    #[test]
    fn test_invalid_period_month() {
        assert!(BillingPeriod::new(2024, 13).is_err());
    }

    #[test]
    fn test_next_daily_run_in_manila() {
        let tz = Timezone::default();
        // 2024-03-01 01:00 Manila (UTC+8) = 2024-02-29 17:00 UTC
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 17, 0, 0).unwrap();
        let next = tz.next_daily_run(2, 0, now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 2, 29, 18, 0, 0).unwrap());

        // already past 02:00 local, so tomorrow
        let later = Utc.with_ymd_and_hms(2024, 2, 29, 19, 0, 0).unwrap();
        let next = tz.next_daily_run(2, 0, later).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_today_uses_local_date() {
        let tz = Timezone::default();
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 17, 30, 0).unwrap();
        assert_eq!(tz.today(now), date(2024, 6, 1));
    }
}
