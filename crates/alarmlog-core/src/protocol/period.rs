// # Protocol Periods and Timer Arithmetic
//
// Calendar-month ranges and the delays the engine sleeps before the next
// scheduled run. All computations are on local wall-clock time.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::messages::DATE_FORMAT;

/// Month covered by the monthly protocol, relative to the send day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolPeriod {
    /// The month the protocol is sent in
    CurrentMonth,
    /// The month before
    #[default]
    PreviousMonth,
    /// Two months before
    TwoMonthsBefore,
}

impl ProtocolPeriod {
    /// Map a numeric selector (0, 1, 2)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::CurrentMonth),
            1 => Some(Self::PreviousMonth),
            2 => Some(Self::TwoMonthsBefore),
            _ => None,
        }
    }

    fn months_back(self) -> u32 {
        match self {
            Self::CurrentMonth => 0,
            Self::PreviousMonth => 1,
            Self::TwoMonthsBefore => 2,
        }
    }

    /// Resolve the period relative to `today`
    pub fn resolve(self, today: NaiveDate) -> crate::Result<ReportRange> {
        let first = today
            .with_day(1)
            .and_then(|first| first.checked_sub_months(Months::new(self.months_back())))
            .ok_or_else(|| {
                crate::Error::invalid_input(format!("Cannot resolve {:?} for {}", self, today))
            })?;
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(|| {
                crate::Error::invalid_input(format!("Cannot resolve {:?} for {}", self, today))
            })?;

        ReportRange::for_dates(first, last)
    }
}

/// Inclusive local-time range covered by a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    /// First day, 00:00:00
    pub start: NaiveDateTime,
    /// Last day, 23:59:59
    pub end: NaiveDateTime,
}

impl ReportRange {
    /// Range from the start of `first` to the end of `last`
    pub fn for_dates(first: NaiveDate, last: NaiveDate) -> crate::Result<Self> {
        if last < first {
            return Err(crate::Error::invalid_input(format!(
                "Report range ends before it starts: {} > {}",
                first, last
            )));
        }
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Ok(Self {
            start: first.and_time(NaiveTime::MIN),
            end: last.and_time(end_of_day),
        })
    }

    /// `DD.MM.YYYY to DD.MM.YYYY`
    pub fn label(&self) -> String {
        format!(
            "{} to {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }

    /// Whether `at` lies within the range
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at <= self.end
    }
}

/// English month name (`month` is 1-based)
pub fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    month
        .checked_sub(1)
        .and_then(|index| NAMES.get(index as usize))
        .copied()
        .unwrap_or("")
}

/// Delay until the next occurrence of `time_of_day`
///
/// A time equal to `now` counts as passed, so the next occurrence is
/// tomorrow's.
pub fn compute_next_fire_delay(time_of_day: NaiveTime, now: NaiveDateTime) -> Duration {
    let today = now.date().and_time(time_of_day);
    let target = if today > now {
        today
    } else {
        now.date()
            .checked_add_days(Days::new(1))
            .map(|tomorrow| tomorrow.and_time(time_of_day))
            .unwrap_or(today)
    };

    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Delay until 00:05 of the next day
pub fn next_cleanup_delay(now: NaiveDateTime) -> Duration {
    let five_past_midnight = NaiveTime::from_hms_opt(0, 5, 0).unwrap_or(NaiveTime::MIN);
    let tomorrow = now
        .date()
        .checked_add_days(Days::new(1))
        .map(|date| date.and_time(five_past_midnight))
        .unwrap_or(now);

    (tomorrow - now).to_std().unwrap_or(Duration::ZERO)
}

/// Whether `today` is the configured send day
///
/// Months shorter than `day_of_month` have no send day.
pub(crate) fn is_send_day(day_of_month: u32, today: NaiveDate) -> bool {
    today.day() == day_of_month
}
