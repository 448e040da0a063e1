//! Detect bookings that overlap a candidate window.
//!
//! Adjacent windows (one ends exactly when the other starts) are NOT conflicts.

use crate::booking::BookingRecord;
use crate::window::TimeWindow;

/// An existing booking that overlaps the candidate window.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub booking: BookingRecord,
    pub overlap_minutes: i64,
}

/// Find every booking overlapping `candidate`, ordered by booking start.
///
/// Each booking is widened by `buffer_minutes` on both sides before the test, so
/// with a buffer of 15 a slot ending at 09:50 conflicts with a booking at 10:00.
/// `overlap_minutes` is measured against the widened booking.
pub fn find_conflicts(
    candidate: &TimeWindow,
    bookings: &[BookingRecord],
    buffer_minutes: u32,
) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = bookings
        .iter()
        .filter_map(|booking| {
            let blocked = booking.window.padded(buffer_minutes);
            if blocked.overlaps(candidate) {
                Some(Conflict {
                    booking: booking.clone(),
                    overlap_minutes: blocked.overlap_minutes(candidate),
                })
            } else {
                None
            }
        })
        .collect();

    conflicts.sort_by_key(|c| (c.booking.start(), c.booking.end()));
    conflicts
}
