//! Tests for the check-then-recheck reservation protocol.

use std::cell::Cell;
use std::sync::Barrier;

use chrono::{DateTime, TimeZone, Utc};
use slot_engine::booking::BookingRecord;
use slot_engine::checker::UnavailableReason;
use slot_engine::config::SlotSettings;
use slot_engine::error::{CommitError, FetchError, SlotError};
use slot_engine::guard::{ConflictGuard, RejectPhase, Reservation};
use slot_engine::policy::{CalendarPolicy, OpeningHours};
use slot_engine::store::{BookingSource, MemoryBookingStore};
use slot_engine::window::TimeWindow;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, h, m, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

fn candidate() -> TimeWindow {
    TimeWindow::new(at(14, 0), at(14, 30)).unwrap()
}

fn standard_policy() -> CalendarPolicy {
    CalendarPolicy::weekly(1..=6, OpeningHours::from_hours(9, 19).unwrap(), chrono_tz::UTC).unwrap()
}

#[test]
fn free_window_is_committed_once() {
    let policy = standard_policy();
    let store = MemoryBookingStore::new();
    let guard = ConflictGuard::new(&policy, &store, SlotSettings::default());
    let calls = Cell::new(0);

    let outcome = guard
        .reserve(&candidate(), &[], now(), |w| {
            calls.set(calls.get() + 1);
            store.append(BookingRecord::new(*w).with_title("Consultation"))
        })
        .unwrap();

    assert!(outcome.is_committed());
    assert_eq!(calls.get(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.snapshot()[0].title.as_deref(), Some("Consultation"));
}

#[test]
fn failed_first_check_never_commits() {
    let policy = standard_policy();
    let store = MemoryBookingStore::new();
    let guard = ConflictGuard::new(&policy, &store, SlotSettings::default());
    let snapshot = vec![BookingRecord::new(TimeWindow::new(at(13, 45), at(14, 15)).unwrap())];

    let outcome = guard
        .reserve(&candidate(), &snapshot, now(), |_| panic!("commit must not run"))
        .unwrap();

    match outcome {
        Reservation::Rejected { phase, reason } => {
            assert_eq!(phase, RejectPhase::Check);
            assert!(matches!(reason, UnavailableReason::AlreadyBooked { .. }));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn booking_appearing_before_commit_is_a_slot_conflict() {
    let policy = standard_policy();
    // The caller's snapshot is empty, but someone else booked in the meantime.
    let racing = BookingRecord::new(candidate()).with_id("other-client");
    let source =
        |_: &TimeWindow| -> Result<Vec<BookingRecord>, FetchError> { Ok(vec![racing.clone()]) };
    let guard = ConflictGuard::new(&policy, &source, SlotSettings::default());

    let outcome = guard
        .reserve(&candidate(), &[], now(), |_| panic!("commit must not run"))
        .unwrap();

    match outcome {
        Reservation::Rejected {
            phase: RejectPhase::Recheck,
            reason: UnavailableReason::SlotConflict { cause: Some(cause) },
        } => match *cause {
            UnavailableReason::AlreadyBooked { conflicting } => {
                assert_eq!(conflicting.id.as_deref(), Some("other-client"));
            }
            other => panic!("unexpected cause {:?}", other),
        },
        other => panic!("expected SlotConflict on recheck, got {:?}", other),
    }
}

#[test]
fn unreachable_store_fails_closed() {
    let policy = standard_policy();
    let store = MemoryBookingStore::new();
    store.set_unreachable(true);
    let guard = ConflictGuard::new(&policy, &store, SlotSettings::default());

    let err = guard
        .reserve(&candidate(), &[], now(), |_| panic!("commit must not run"))
        .unwrap_err();

    assert!(matches!(err, SlotError::FetchFailure(FetchError::Unreachable(_))));
}

#[test]
fn store_refusal_is_a_slot_conflict() {
    let policy = standard_policy();
    let source = |_: &TimeWindow| -> Result<Vec<BookingRecord>, FetchError> { Ok(Vec::new()) };
    let guard = ConflictGuard::new(&policy, &source, SlotSettings::default());
    let existing = BookingRecord::new(candidate()).with_id("dup");

    let outcome = guard
        .reserve(&candidate(), &[], now(), |_| Err(CommitError::Conflict(Some(existing.clone()))))
        .unwrap();

    assert_eq!(
        outcome,
        Reservation::Rejected {
            phase: RejectPhase::Commit,
            reason: UnavailableReason::SlotConflict {
                cause: Some(Box::new(UnavailableReason::AlreadyBooked { conflicting: existing })),
            },
        }
    );
}

#[test]
fn store_write_failure_is_an_error() {
    let policy = standard_policy();
    let source = |_: &TimeWindow| -> Result<Vec<BookingRecord>, FetchError> { Ok(Vec::new()) };
    let guard = ConflictGuard::new(&policy, &source, SlotSettings::default());

    let err = guard
        .reserve(&candidate(), &[], now(), |_| Err(CommitError::Unavailable("disk full".into())))
        .unwrap_err();

    assert!(matches!(err, SlotError::CommitFailure(ref m) if m == "disk full"));
}

#[test]
fn recheck_fetches_around_the_candidate() {
    let policy = standard_policy();
    let seen = std::sync::Mutex::new(Vec::new());
    let source = |w: &TimeWindow| -> Result<Vec<BookingRecord>, FetchError> {
        seen.lock().unwrap().push(*w);
        Ok(Vec::new())
    };
    let guard = ConflictGuard::new(&policy, &source, SlotSettings::new(30, 10).unwrap());

    guard
        .commit_with_recheck(&candidate(), now(), |w| Ok(BookingRecord::new(*w)))
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], TimeWindow::new(at(13, 50), at(14, 40)).unwrap());
}

#[test]
fn concurrent_reservations_for_one_window_commit_exactly_once() {
    let policy = standard_policy();
    let store = MemoryBookingStore::new();
    let barrier = Barrier::new(2);

    let outcomes: Vec<Reservation> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|client| {
                let (policy, store, barrier) = (&policy, &store, &barrier);
                scope.spawn(move || {
                    let guard = ConflictGuard::new(policy, store, SlotSettings::default());
                    let snapshot = store.fetch(&candidate()).unwrap();
                    // Both clients pass the first check before either commits.
                    assert!(guard.check(&candidate(), &snapshot, now()).is_available());
                    barrier.wait();
                    guard
                        .commit_with_recheck(&candidate(), now(), |w| {
                            let id = format!("client-{}", client);
                            store.append(BookingRecord::new(*w).with_id(id))
                        })
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let committed = outcomes.iter().filter(|o| o.is_committed()).count();
    assert_eq!(committed, 1, "exactly one reservation must win: {:?}", outcomes);

    let loser = outcomes.iter().find(|o| !o.is_committed()).unwrap();
    assert!(matches!(
        loser,
        Reservation::Rejected {
            reason: UnavailableReason::SlotConflict { .. },
            ..
        }
    ));
    assert_eq!(store.len(), 1);
}
