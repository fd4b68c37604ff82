//! Time windows and civil-calendar conversion.
//!
//! All windows are half-open `[start, end)` in UTC. Civil dates (what the
//! screens show and what requests carry) are interpreted in one configured
//! fixed offset.

use chrono::{DateTime, Days, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use fixtrack_core::{DomainError, DomainResult};

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end < start {
            return Err(DomainError::validation(format!(
                "window end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Split at `at` into two adjacent windows with no gap.
    pub fn split_at(&self, at: DateTime<Utc>) -> DomainResult<(Self, Self)> {
        if !self.contains(at) {
            return Err(DomainError::validation(format!("{at} is outside the window")));
        }
        Ok((
            Self {
                start: self.start,
                end: at,
            },
            Self { start: at, end: self.end },
        ))
    }
}

/// Civil calendar in one fixed UTC offset (default +09:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilCalendar {
    offset: FixedOffset,
}

pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 9 * 60;

impl Default for CivilCalendar {
    fn default() -> Self {
        Self::from_offset_minutes(DEFAULT_UTC_OFFSET_MINUTES).unwrap_or(Self { offset: Utc.fix() })
    }
}

impl CivilCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_offset_minutes(minutes: i32) -> DomainResult<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
            .ok_or_else(|| DomainError::validation(format!("UTC offset out of range: {minutes} minutes")))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    pub fn civil_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    /// Instant at which `date` begins locally.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        // Fixed offsets never produce gaps or folds.
        (local - self.offset).and_utc()
    }

    /// The whole civil day `date`.
    pub fn day(&self, date: NaiveDate) -> DomainResult<TimeWindow> {
        self.dates(date, date)
    }

    /// Civil dates `first..=last` as one window.
    pub fn dates(&self, first: NaiveDate, last: NaiveDate) -> DomainResult<TimeWindow> {
        if last < first {
            return Err(DomainError::validation(format!(
                "end date {last} is before start date {first}"
            )));
        }
        let after_last = last
            .checked_add_days(Days::new(1))
            .ok_or_else(|| DomainError::validation(format!("end date {last} is out of range")))?;
        TimeWindow::new(self.day_start(first), self.day_start(after_last))
    }

    /// `at` moved back `months` calendar months, in local time.
    pub fn months_before(&self, at: DateTime<Utc>, months: u32) -> DomainResult<DateTime<Utc>> {
        self.local(at)
            .checked_sub_months(Months::new(months))
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| DomainError::validation(format!("{months} months before {at} is out of range")))
    }
}
