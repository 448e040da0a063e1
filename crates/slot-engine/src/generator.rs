//! Daily slot generation.
//!
//! The hours before opening and after closing are treated as occupied intervals
//! alongside the day's bookings, so a single gap-finding pass excludes both the
//! closed hours and the booked time. Within each gap wide enough for the
//! requested duration, slot starts are aligned to the wall-clock step (09:00,
//! 09:30, ...) and emitted until the next occupied interval.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::booking::BookingRecord;
use crate::config::SlotSettings;
use crate::error::{Result, SlotError};
use crate::policy::CalendarPolicy;
use crate::time;
use crate::window::{merge_intervals, TimeWindow};

/// Compute the bookable slots of `duration_minutes` on `date`.
///
/// Bookings overlapping the day's opening hours are widened by
/// `settings.buffer_minutes` and treated as occupied. A slot may start exactly
/// when an occupied interval ends and may end exactly when the next begins.
///
/// Returns an empty list when the location is closed on `date` or no gap is
/// long enough.
///
/// # Errors
/// Returns `SlotError::InvalidDuration` for a zero duration.
pub fn generate_day(
    date: NaiveDate,
    duration_minutes: u32,
    bookings: &[BookingRecord],
    policy: &CalendarPolicy,
    settings: &SlotSettings,
) -> Result<Vec<TimeWindow>> {
    if duration_minutes == 0 {
        return Err(SlotError::InvalidDuration(duration_minutes));
    }

    let Some(day) = policy.open_window(date) else {
        return Ok(Vec::new());
    };

    let tz = policy.timezone();
    let duration = Duration::minutes(i64::from(duration_minutes));
    let step = Duration::minutes(i64::from(settings.step_minutes.max(1)));

    let mut occupied: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(bookings.len() + 2);
    occupied.push((DateTime::<Utc>::MIN_UTC, day.start()));
    occupied.push((day.end(), DateTime::<Utc>::MAX_UTC));
    occupied.extend(
        bookings
            .iter()
            .map(|b| b.window.padded(settings.buffer_minutes))
            .filter(|w| w.overlaps(&day))
            .map(|w| (w.start(), w.end())),
    );

    let occupied = merge_intervals(occupied);

    let mut slots = Vec::new();
    for pair in occupied.windows(2) {
        let (gap_start, gap_end) = (pair[0].1, pair[1].0);
        if gap_end - gap_start < duration {
            continue;
        }

        // Rounding only ever moves forward, so the first candidate never
        // starts inside the previous occupied interval.
        let mut candidate = time::round_up_to_step(gap_start, tz, settings.step_minutes);
        while candidate + duration <= gap_end {
            slots.push(TimeWindow::new(candidate, candidate + duration)?);
            candidate += step;
        }
    }

    debug!(%date, duration_minutes, slots = slots.len(), "generated day");
    Ok(slots)
}
