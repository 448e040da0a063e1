//! Validate a single candidate window against a policy and existing bookings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::booking::BookingRecord;
use crate::config::SlotSettings;
use crate::conflict::find_conflicts;
use crate::policy::CalendarPolicy;
use crate::time;
use crate::window::TimeWindow;

/// Why a window cannot be booked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The window starts before "now".
    InThePast,
    /// The location is not open on the window's date.
    ClosedDay,
    /// The window starts before opening or ends after closing.
    OutsideHours,
    /// The window overlaps an existing booking.
    AlreadyBooked { conflicting: BookingRecord },
    /// The window passed the first check but failed the re-check right before
    /// commit, or the store refused the write.
    SlotConflict { cause: Option<Box<UnavailableReason>> },
}

/// Outcome of [`check_availability`].
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Available,
    Unavailable(UnavailableReason),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn reason(&self) -> Option<&UnavailableReason> {
        match self {
            Availability::Available => None,
            Availability::Unavailable(reason) => Some(reason),
        }
    }
}

/// Check whether `candidate` can be booked.
///
/// Checks run in order and stop at the first failure: in the past, closed day,
/// outside hours, overlapping booking. The day is taken from the candidate's
/// start in the policy's timezone. When several bookings overlap, the earliest
/// one is reported.
pub fn check_availability(
    candidate: &TimeWindow,
    policy: &CalendarPolicy,
    bookings: &[BookingRecord],
    settings: &SlotSettings,
    now: DateTime<Utc>,
) -> Availability {
    if candidate.start() < now {
        return Availability::Unavailable(UnavailableReason::InThePast);
    }

    let date = time::local_date(candidate.start(), policy.timezone());
    if !policy.is_open(date) {
        return Availability::Unavailable(UnavailableReason::ClosedDay);
    }

    match policy.open_window(date) {
        Some(day) if day.contains(candidate) => {}
        Some(_) => return Availability::Unavailable(UnavailableReason::OutsideHours),
        // Opening time skipped by a DST transition.
        None => return Availability::Unavailable(UnavailableReason::ClosedDay),
    }

    match find_conflicts(candidate, bookings, settings.buffer_minutes)
        .into_iter()
        .next()
    {
        Some(conflict) => Availability::Unavailable(UnavailableReason::AlreadyBooked {
            conflicting: conflict.booking,
        }),
        None => Availability::Available,
    }
}
