//! Multi-day slot aggregation and incremental merging.
//!
//! [`collect_slots`] runs the daily generator over a range of dates and drops
//! slots that already started. [`merge_slots`] folds a newly fetched batch into
//! slots a client already holds, so a calendar UI can lazily load further
//! months without double-counting days it has seen.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::booking::BookingRecord;
use crate::config::SlotSettings;
use crate::error::Result;
use crate::generator::generate_day;
use crate::policy::CalendarPolicy;
use crate::window::TimeWindow;

/// A bookable slot, expressed in the location's local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub date: NaiveDate,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub duration_minutes: u32,
}

impl AvailableSlot {
    /// Identity used for de-duplication: `(date, start instant)`.
    pub fn key(&self) -> (NaiveDate, DateTime<Utc>) {
        (self.date, self.start.with_timezone(&Utc))
    }

    pub fn window(&self) -> Result<TimeWindow> {
        TimeWindow::new(self.start.with_timezone(&Utc), self.end.with_timezone(&Utc))
    }
}

/// Slots of one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDay {
    pub date: NaiveDate,
    pub slots: Vec<AvailableSlot>,
}

/// Collect the slots of `duration_minutes` over `day_count` days from `start_date`.
///
/// Closed days contribute nothing. Slots whose start is before `now` are dropped.
/// The result is ordered by start time.
pub fn collect_slots(
    start_date: NaiveDate,
    day_count: u32,
    duration_minutes: u32,
    policy: &CalendarPolicy,
    bookings: &[BookingRecord],
    settings: &SlotSettings,
    now: DateTime<Utc>,
) -> Result<Vec<AvailableSlot>> {
    let tz = policy.timezone();
    let mut slots = Vec::new();

    for date in dates(start_date, day_count) {
        if !policy.is_open(date) {
            continue;
        }
        let day = generate_day(date, duration_minutes, bookings, policy, settings)?;
        slots.extend(
            day.into_iter()
                .filter(|w| w.start() >= now)
                .map(|w| AvailableSlot {
                    date,
                    start: w.start().with_timezone(&tz).fixed_offset(),
                    end: w.end().with_timezone(&tz).fixed_offset(),
                    duration_minutes,
                }),
        );
    }

    debug!(%start_date, day_count, duration_minutes, slots = slots.len(), "collected slots");
    Ok(slots)
}

/// Merge newly fetched slots into those already known.
///
/// Idempotent: a slot whose `(date, start)` is already present is not added
/// again, so re-merging a loaded day is a no-op. The result is ordered by date
/// and start.
pub fn merge_slots(existing: &[AvailableSlot], fetched: &[AvailableSlot]) -> Vec<AvailableSlot> {
    let mut merged: BTreeMap<(NaiveDate, DateTime<Utc>), AvailableSlot> = BTreeMap::new();
    for slot in existing.iter().chain(fetched) {
        merged.entry(slot.key()).or_insert_with(|| slot.clone());
    }
    merged.into_values().collect()
}

/// Dates in `[start_date, start_date + day_count)` not present in `known`.
///
/// Lets a client ask only for days it has not loaded yet.
pub fn missing_dates(
    known: &BTreeSet<NaiveDate>,
    start_date: NaiveDate,
    day_count: u32,
) -> Vec<NaiveDate> {
    dates(start_date, day_count)
        .filter(|d| !known.contains(d))
        .collect()
}

/// Group slots by calendar date, in date order.
pub fn group_by_date(slots: &[AvailableSlot]) -> Vec<SlotDay> {
    let mut days: BTreeMap<NaiveDate, Vec<AvailableSlot>> = BTreeMap::new();
    for slot in slots {
        days.entry(slot.date).or_default().push(slot.clone());
    }
    days.into_iter()
        .map(|(date, mut slots)| {
            slots.sort_by_key(|s| s.start);
            SlotDay { date, slots }
        })
        .collect()
}

fn dates(start_date: NaiveDate, day_count: u32) -> impl Iterator<Item = NaiveDate> {
    (0..u64::from(day_count))
        .map_while(move |offset| start_date.checked_add_days(Days::new(offset)))
}
