//! Timestamp normalization.
//!
//! Every externally supplied date passes through [`normalize`] before it takes
//! part in arithmetic. Comparisons are done on absolute instants (`DateTime<Utc>`);
//! the business timezone is only used to bucket instants into calendar days and
//! to align slot starts to the wall clock.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::error::{Result, SlotError};

/// Naive layouts accepted in addition to RFC 3339. These are interpreted as wall
/// clock time in the business timezone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an IANA timezone name.
///
/// # Errors
/// Returns `SlotError::InvalidTimezone` if the name is not a known identifier.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| SlotError::InvalidTimezone(name.to_string()))
}

/// Normalize a raw timestamp into an instant anchored to `tz`.
///
/// Accepts RFC 3339 (offset given, e.g. `2026-03-03T14:00:00+01:00`) or a naive
/// local datetime (e.g. `2026-03-03T14:00`) which is read as wall clock time in
/// `tz`. A naive time that falls in a DST gap or fold is rejected rather than
/// guessed.
///
/// # Errors
/// Returns `SlotError::InvalidTimestamp` when the input is empty, unparseable, or
/// does not name exactly one instant.
pub fn normalize(raw: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SlotError::timestamp(raw, "empty timestamp"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&tz));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| SlotError::timestamp(raw, "unrecognized timestamp format"))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(_, _) => Err(SlotError::timestamp(
            raw,
            format!("ambiguous local time in {}", tz.name()),
        )),
        LocalResult::None => Err(SlotError::timestamp(
            raw,
            format!("local time does not exist in {}", tz.name()),
        )),
    }
}

/// Normalize a raw timestamp straight to a UTC instant.
pub fn normalize_utc(raw: &str, tz: Tz) -> Result<DateTime<Utc>> {
    normalize(raw, tz).map(|dt| dt.with_timezone(&Utc))
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| SlotError::timestamp(raw, e.to_string()))
}

/// The instant at which the wall clock in `tz` reads `time` on `date`.
///
/// Ambiguous times (DST fold) resolve to the earlier instant. Returns `None`
/// when the wall clock skips over `time` on that date.
pub fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The calendar date of `instant` as seen in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Round `instant` up to the next wall-clock multiple of `step_minutes` in `tz`.
///
/// An instant already on a step boundary is returned unchanged, so 09:00 stays
/// 09:00 and 09:07 becomes 09:30 for a 30-minute step.
pub fn round_up_to_step(instant: DateTime<Utc>, tz: Tz, step_minutes: u32) -> DateTime<Utc> {
    let step_secs = i64::from(step_minutes.max(1)) * 60;
    let local = instant.with_timezone(&tz);
    let secs = i64::from(local.num_seconds_from_midnight());
    let nanos = i64::from(local.nanosecond());
    let rem = secs % step_secs;

    if rem == 0 && nanos == 0 {
        return instant;
    }

    let whole = instant - Duration::nanoseconds(nanos);
    if rem == 0 {
        whole + Duration::seconds(step_secs)
    } else {
        whole + Duration::seconds(step_secs - rem)
    }
}
