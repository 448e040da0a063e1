//! Check-then-recheck reservation protocol.
//!
//! The booking store is external and not transactional from here, so a
//! reservation runs in two phases:
//!
//! 1. [`ConflictGuard::check`] validates the candidate against the booking
//!    snapshot the caller already holds.
//! 2. [`ConflictGuard::commit_with_recheck`] re-fetches bookings, validates
//!    again, and only then invokes the commit callback.
//!
//! This narrows the race between two concurrent reservations for one window but
//! does not close it. Mutual exclusion has to come from the store itself (for
//! example [`MemoryBookingStore::append`](crate::store::MemoryBookingStore::append),
//! which refuses overlapping writes); a store-side refusal is reported as
//! `SlotConflict` like a failed re-check.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::booking::BookingRecord;
use crate::checker::{check_availability, Availability, UnavailableReason};
use crate::config::SlotSettings;
use crate::error::{CommitError, Result, SlotError};
use crate::policy::CalendarPolicy;
use crate::store::BookingSource;
use crate::window::TimeWindow;

/// The step at which a reservation was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectPhase {
    /// Against the caller's snapshot, before anything was re-fetched.
    Check,
    /// Against the bookings re-fetched right before commit.
    Recheck,
    /// The store refused the write.
    Commit,
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    Committed(BookingRecord),
    Rejected {
        phase: RejectPhase,
        reason: UnavailableReason,
    },
}

impl Reservation {
    pub fn is_committed(&self) -> bool {
        matches!(self, Reservation::Committed(_))
    }
}

/// Wraps the commit of one reservation with a re-validation against fresh data.
pub struct ConflictGuard<'a, S: BookingSource> {
    policy: &'a CalendarPolicy,
    source: &'a S,
    settings: SlotSettings,
}

impl<'a, S: BookingSource> ConflictGuard<'a, S> {
    pub fn new(policy: &'a CalendarPolicy, source: &'a S, settings: SlotSettings) -> Self {
        Self {
            policy,
            source,
            settings,
        }
    }

    /// Phase one: validate against an already-fetched snapshot.
    pub fn check(
        &self,
        candidate: &TimeWindow,
        snapshot: &[BookingRecord],
        now: DateTime<Utc>,
    ) -> Availability {
        check_availability(candidate, self.policy, snapshot, &self.settings, now)
    }

    /// Phase two: re-fetch, re-validate, and commit if still free.
    ///
    /// `commit` is called at most once, and never when the re-check fails.
    ///
    /// # Errors
    /// `SlotError::FetchFailure` when the re-fetch fails (nothing is committed),
    /// `SlotError::CommitFailure` when the store cannot be written.
    pub fn commit_with_recheck<F>(
        &self,
        candidate: &TimeWindow,
        now: DateTime<Utc>,
        commit: F,
    ) -> Result<Reservation>
    where
        F: FnOnce(&TimeWindow) -> std::result::Result<BookingRecord, CommitError>,
    {
        let fresh = self
            .source
            .fetch(&candidate.padded(self.settings.buffer_minutes))
            .map_err(|e| {
                warn!(error = %e, "booking re-fetch failed; not committing");
                SlotError::FetchFailure(e)
            })?;

        if let Availability::Unavailable(reason) = self.check(candidate, &fresh, now) {
            warn!(start = %candidate.start(), ?reason, "slot taken between check and commit");
            return Ok(Reservation::Rejected {
                phase: RejectPhase::Recheck,
                reason: UnavailableReason::SlotConflict {
                    cause: Some(Box::new(reason)),
                },
            });
        }

        debug!(start = %candidate.start(), end = %candidate.end(), "committing reservation");
        match commit(candidate) {
            Ok(record) => {
                info!(start = %record.start(), end = %record.end(), "reservation committed");
                Ok(Reservation::Committed(record))
            }
            Err(CommitError::Conflict(existing)) => {
                warn!(start = %candidate.start(), "store rejected overlapping reservation");
                Ok(Reservation::Rejected {
                    phase: RejectPhase::Commit,
                    reason: UnavailableReason::SlotConflict {
                        cause: existing.map(|conflicting| {
                            Box::new(UnavailableReason::AlreadyBooked { conflicting })
                        }),
                    },
                })
            }
            Err(CommitError::Unavailable(message)) => Err(SlotError::CommitFailure(message)),
        }
    }

    /// Run both phases: check against `snapshot`, then re-check and commit.
    pub fn reserve<F>(
        &self,
        candidate: &TimeWindow,
        snapshot: &[BookingRecord],
        now: DateTime<Utc>,
        commit: F,
    ) -> Result<Reservation>
    where
        F: FnOnce(&TimeWindow) -> std::result::Result<BookingRecord, CommitError>,
    {
        if let Availability::Unavailable(reason) = self.check(candidate, snapshot, now) {
            debug!(start = %candidate.start(), ?reason, "reservation rejected on first check");
            return Ok(Reservation::Rejected {
                phase: RejectPhase::Check,
                reason,
            });
        }
        self.commit_with_recheck(candidate, now, commit)
    }
}
