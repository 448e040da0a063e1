//! Error types for slot-engine operations.
//!
//! Policy outcomes (a closed day, an overlapping booking) are not errors: they
//! are reported as [`UnavailableReason`](crate::checker::UnavailableReason)
//! values. The variants here cover malformed input and I/O at the booking
//! store boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("Invalid timestamp '{input}': {message}")]
    InvalidTimestamp { input: String, message: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Unknown location: {0}")]
    InvalidLocation(String),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Invalid booking at index {index}: {message}")]
    InvalidBooking { index: usize, message: String },

    #[error("Invalid duration: {0} minutes")]
    InvalidDuration(u32),

    #[error("Invalid day count {count}: must be between 1 and {max}")]
    InvalidDayCount { count: u32, max: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Availability is unknown because the booking source could not be read.
    #[error("Booking source unavailable: {0}")]
    FetchFailure(#[from] FetchError),

    #[error("Commit failed: {0}")]
    CommitFailure(String),
}

/// Failure reading committed bookings from the external store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("{0}")]
    Unreachable(String),
}

/// Failure appending a booking to the external store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommitError {
    /// The store refused the write because it overlaps an existing booking.
    #[error("store rejected overlapping booking")]
    Conflict(Option<crate::booking::BookingRecord>),

    #[error("{0}")]
    Unavailable(String),
}

impl SlotError {
    pub(crate) fn timestamp(input: &str, message: impl Into<String>) -> Self {
        SlotError::InvalidTimestamp {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SlotError>;
