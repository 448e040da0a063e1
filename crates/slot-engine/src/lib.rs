//! # slot-engine
//!
//! Slot availability and booking-conflict engine for appointment scheduling.
//!
//! Given the bookings already committed to an external calendar and a location's
//! opening policy, the engine computes the free slots of a requested duration and
//! reserves one while guarding against double-booking. It owns no persistent
//! state: every query fetches a fresh booking snapshot and computes from scratch.
//!
//! ## Modules
//!
//! - [`time`] — Timestamp normalization into zoned instants
//! - [`window`] — Half-open `TimeWindow` and overlap tests
//! - [`booking`] — `BookingRecord` and validation of calendar payloads
//! - [`policy`] — Weekly / explicit-date opening policies and the location registry
//! - [`config`] — JSON configuration and slot settings
//! - [`generator`] — Bookable slots for one day
//! - [`aggregator`] — Slots over a range of days, idempotent merging
//! - [`conflict`] — Bookings overlapping a candidate window
//! - [`checker`] — Validate one candidate window, with a typed reason
//! - [`store`] — Booking source trait and an in-memory store
//! - [`guard`] — Check-then-recheck reservation protocol
//! - [`engine`] — Facade tying registry, source and settings together
//! - [`error`] — Error types

pub mod aggregator;
pub mod booking;
pub mod checker;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod generator;
pub mod guard;
pub mod policy;
pub mod store;
pub mod time;
pub mod window;

pub use aggregator::{collect_slots, group_by_date, merge_slots, AvailableSlot, SlotDay};
pub use booking::{parse_bookings, BookingRecord};
pub use checker::{check_availability, Availability, UnavailableReason};
pub use config::{EngineConfig, SlotSettings};
pub use engine::{BookingEngine, ReservationRequest, SlotQuery};
pub use error::{CommitError, FetchError, SlotError};
pub use generator::generate_day;
pub use guard::{ConflictGuard, RejectPhase, Reservation};
pub use policy::{CalendarPolicy, OpeningHours, PolicyRegistry};
pub use store::{BookingSource, MemoryBookingStore};
pub use time::normalize;
pub use window::TimeWindow;
