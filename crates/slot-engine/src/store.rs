//! The booking store boundary.
//!
//! The system of record for bookings is external. The engine reads it through
//! [`BookingSource`]; writes go through the commit callback handed to the
//! conflict guard. [`MemoryBookingStore`] is an in-process store that refuses
//! overlapping appends, giving the mutual exclusion the guard alone cannot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::booking::BookingRecord;
use crate::error::{CommitError, FetchError};
use crate::window::TimeWindow;

/// Read access to committed bookings.
pub trait BookingSource {
    /// Bookings overlapping `window`.
    ///
    /// Implementations must report an unreachable store as an error, never as an
    /// empty list.
    fn fetch(&self, window: &TimeWindow) -> Result<Vec<BookingRecord>, FetchError>;
}

impl<F> BookingSource for F
where
    F: Fn(&TimeWindow) -> Result<Vec<BookingRecord>, FetchError>,
{
    fn fetch(&self, window: &TimeWindow) -> Result<Vec<BookingRecord>, FetchError> {
        self(window)
    }
}

/// In-memory booking store with overlap-rejecting appends.
#[derive(Debug, Default)]
pub struct MemoryBookingStore {
    bookings: Mutex<Vec<BookingRecord>>,
    unreachable: AtomicBool,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bookings(bookings: Vec<BookingRecord>) -> Self {
        Self {
            bookings: Mutex::new(bookings),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent fetch and append fail, simulating an outage.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Append `record` unless it overlaps a stored booking.
    ///
    /// The overlap test and the insert happen under one lock, so of two racing
    /// appends for the same window exactly one succeeds.
    pub fn append(&self, record: BookingRecord) -> Result<BookingRecord, CommitError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CommitError::Unavailable("store unreachable".to_string()));
        }
        let mut bookings = self
            .bookings
            .lock()
            .map_err(|_| CommitError::Unavailable("store lock poisoned".to_string()))?;
        if let Some(existing) = bookings.iter().find(|b| b.window.overlaps(&record.window)) {
            return Err(CommitError::Conflict(Some(existing.clone())));
        }
        bookings.push(record.clone());
        Ok(record)
    }

    /// All stored bookings, ordered by start.
    pub fn snapshot(&self) -> Vec<BookingRecord> {
        let mut all = match self.bookings.lock() {
            Ok(bookings) => bookings.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        all.sort_by_key(|b| (b.start(), b.end()));
        all
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BookingSource for MemoryBookingStore {
    fn fetch(&self, window: &TimeWindow) -> Result<Vec<BookingRecord>, FetchError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable("store unreachable".to_string()));
        }
        let bookings = self
            .bookings
            .lock()
            .map_err(|_| FetchError::Unreachable("store lock poisoned".to_string()))?;
        Ok(bookings
            .iter()
            .filter(|b| b.window.overlaps(window))
            .cloned()
            .collect())
    }
}
