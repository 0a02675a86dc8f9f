//! Date range generation for per-period saving.

use crate::error::{BgcError, Result};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Period length used to split a run window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Day,
    Week,
    Month,
    Year,
    Custom,
}

impl FromStr for Interval {
    type Err = BgcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "day" => Ok(Interval::Day),
            "week" => Ok(Interval::Week),
            "month" => Ok(Interval::Month),
            "year" => Ok(Interval::Year),
            "custom" => Ok(Interval::Custom),
            other => Err(BgcError::configuration(format!(
                "unknown interval '{}', expected day, week, month, year or custom",
                other
            ))),
        }
    }
}

/// Inclusive date range, ending at 23:59:59 of its last day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    fn from_days(start: NaiveDate, end: NaiveDate) -> Self {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Self {
            start: start.and_time(NaiveTime::MIN),
            end: end.and_time(last_second),
        }
    }

    /// `YYYYMMDD-YYYYMMDD` tag used in file names
    pub fn as_str(&self) -> String {
        format!(
            "{}-{}",
            self.start.format(crate::constants::FILENAME_DATE_FORMAT),
            self.end.format(crate::constants::FILENAME_DATE_FORMAT)
        )
    }
}

/// Splits `[start, end]` into consecutive ranges
#[derive(Debug, Clone)]
pub struct DateRangeGenerator {
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
    interval_length: u32,
}

impl DateRangeGenerator {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
        interval_length: u32,
    ) -> Result<Self> {
        if start > end {
            return Err(BgcError::configuration(format!(
                "date range start {} is after its end {}",
                start, end
            )));
        }
        if interval == Interval::Custom && interval_length == 0 {
            return Err(BgcError::configuration("custom interval length must be positive"));
        }
        Ok(Self {
            start,
            end,
            interval,
            interval_length,
        })
    }

    /// Generate the ranges, covering every day of the window exactly once
    pub fn ranges(&self) -> Vec<DateRange> {
        match self.interval {
            Interval::Custom => self.custom_ranges(),
            _ => self.calendar_ranges(),
        }
    }

    fn custom_ranges(&self) -> Vec<DateRange> {
        let mut ranges = Vec::new();
        let mut start = self.start;
        while start <= self.end {
            let next = start + Days::new(u64::from(self.interval_length));
            let end = next.pred_opt().unwrap_or(next).min(self.end);
            ranges.push(DateRange::from_days(start, end));
            start = next;
        }
        ranges
    }

    fn calendar_ranges(&self) -> Vec<DateRange> {
        let ends: Vec<NaiveDate> = self
            .start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .filter(|d| self.is_period_end(*d))
            .collect();
        if ends.is_empty() {
            return vec![DateRange::from_days(self.start, self.end)];
        }
        let mut ranges = Vec::with_capacity(ends.len() + 1);
        let mut start = self.start;
        for end in &ends {
            ranges.push(DateRange::from_days(start, *end));
            start = end.succ_opt().unwrap_or(*end);
        }
        if ends.last() != Some(&self.end) {
            ranges.push(DateRange::from_days(start, self.end));
        }
        ranges
    }

    fn is_period_end(&self, date: NaiveDate) -> bool {
        match self.interval {
            Interval::Day | Interval::Custom => true,
            Interval::Week => date.weekday() == Weekday::Sun,
            Interval::Month => date.succ_opt().is_none_or(|next| next.month() != date.month()),
            Interval::Year => date.month() == 12 && date.day() == 31,
        }
    }
}
