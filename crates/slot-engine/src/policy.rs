//! Calendar policies: which dates a location is open, and its hours on them.
//!
//! A location either follows a weekly pattern or is open only on an explicit
//! allow-list of pre-announced dates. Both are variants of [`CalendarPolicy`];
//! the generator and checker never branch on the variant themselves.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{Result, SlotError};
use crate::time;
use crate::window::TimeWindow;

/// Daily opening and closing wall-clock times. `open < close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpeningHours {
    open: NaiveTime,
    close: NaiveTime,
}

impl OpeningHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open >= close {
            return Err(SlotError::InvalidConfig(format!(
                "opening time {} is not before closing time {}",
                open, close
            )));
        }
        Ok(Self { open, close })
    }

    /// Whole-hour convenience constructor, e.g. `from_hours(9, 19)`.
    pub fn from_hours(open_hour: u32, close_hour: u32) -> Result<Self> {
        let to_time = |h: u32| {
            NaiveTime::from_hms_opt(h, 0, 0)
                .ok_or_else(|| SlotError::InvalidConfig(format!("hour {} out of range", h)))
        };
        Self::new(to_time(open_hour)?, to_time(close_hour)?)
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    /// Nominal length of the business day in minutes.
    pub fn minutes(&self) -> i64 {
        (self.close - self.open).num_minutes()
    }
}

/// The opening rule of one location.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarPolicy {
    /// Open on a fixed set of weekdays (0 = Sunday .. 6 = Saturday).
    Weekly {
        open_weekdays: BTreeSet<u8>,
        hours: OpeningHours,
        timezone: Tz,
    },
    /// Open only on the listed dates, for the nominal business hours.
    ExplicitDates {
        allowed_dates: BTreeSet<NaiveDate>,
        hours: OpeningHours,
        timezone: Tz,
    },
}

impl CalendarPolicy {
    /// Build a weekly policy.
    ///
    /// # Errors
    /// Returns `SlotError::InvalidConfig` if a weekday is outside `0..=6`.
    pub fn weekly(
        open_weekdays: impl IntoIterator<Item = u8>,
        hours: OpeningHours,
        timezone: Tz,
    ) -> Result<Self> {
        let open_weekdays: BTreeSet<u8> = open_weekdays.into_iter().collect();
        if let Some(bad) = open_weekdays.iter().find(|&&d| d > 6) {
            return Err(SlotError::InvalidConfig(format!(
                "weekday {} out of range 0..=6",
                bad
            )));
        }
        Ok(CalendarPolicy::Weekly {
            open_weekdays,
            hours,
            timezone,
        })
    }

    pub fn explicit_dates(
        allowed_dates: impl IntoIterator<Item = NaiveDate>,
        hours: OpeningHours,
        timezone: Tz,
    ) -> Self {
        CalendarPolicy::ExplicitDates {
            allowed_dates: allowed_dates.into_iter().collect(),
            hours,
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        match self {
            CalendarPolicy::Weekly { timezone, .. }
            | CalendarPolicy::ExplicitDates { timezone, .. } => *timezone,
        }
    }

    pub fn is_open(&self, date: NaiveDate) -> bool {
        match self {
            CalendarPolicy::Weekly { open_weekdays, .. } => {
                // `num_days_from_sunday` is in 0..=6, so the cast cannot truncate.
                open_weekdays.contains(&(date.weekday().num_days_from_sunday() as u8))
            }
            CalendarPolicy::ExplicitDates { allowed_dates, .. } => allowed_dates.contains(&date),
        }
    }

    /// Opening hours on `date`, or `None` when the location is closed.
    pub fn hours(&self, date: NaiveDate) -> Option<OpeningHours> {
        if !self.is_open(date) {
            return None;
        }
        match self {
            CalendarPolicy::Weekly { hours, .. } | CalendarPolicy::ExplicitDates { hours, .. } => {
                Some(*hours)
            }
        }
    }

    /// The absolute `[open, close)` window on `date`.
    ///
    /// `None` when the location is closed, or when a DST transition removes the
    /// opening or closing wall-clock time on that date.
    pub fn open_window(&self, date: NaiveDate) -> Option<TimeWindow> {
        let hours = self.hours(date)?;
        let tz = self.timezone();
        let open = time::local_instant(tz, date, hours.open())?;
        let close = time::local_instant(tz, date, hours.close())?;
        TimeWindow::new(open, close).ok()
    }
}

/// Static table mapping location ids to their policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, CalendarPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location_id: impl Into<String>, policy: CalendarPolicy) {
        self.policies.insert(location_id.into(), policy);
    }

    pub fn with_location(mut self, location_id: impl Into<String>, policy: CalendarPolicy) -> Self {
        self.insert(location_id, policy);
        self
    }

    /// Look up a location's policy.
    ///
    /// # Errors
    /// Returns `SlotError::InvalidLocation` for an unknown id.
    pub fn get(&self, location_id: &str) -> Result<&CalendarPolicy> {
        self.policies
            .get(location_id)
            .ok_or_else(|| SlotError::InvalidLocation(location_id.to_string()))
    }

    pub fn location_ids(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
