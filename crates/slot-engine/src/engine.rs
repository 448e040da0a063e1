//! The query/check/reserve facade over a location registry and a booking source.
//!
//! Every call looks up the location policy, fetches a fresh booking snapshot and
//! computes from scratch. No state is shared between calls, so one engine can
//! serve any number of concurrent queries. A failed fetch is reported as
//! `FetchFailure`; it is never read as "no bookings".

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::aggregator::{collect_slots, AvailableSlot};
use crate::booking::BookingRecord;
use crate::checker::{check_availability, Availability};
use crate::config::{EngineConfig, SlotSettings, DEFAULT_MAX_DAY_COUNT};
use crate::error::{CommitError, Result, SlotError};
use crate::guard::{ConflictGuard, Reservation};
use crate::policy::{CalendarPolicy, PolicyRegistry};
use crate::store::BookingSource;
use crate::time;
use crate::window::TimeWindow;

/// A request for bookable slots.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub location_id: String,
    pub duration_minutes: u32,
    pub day_count: u32,
    /// First date to search; defaults to today in the location's timezone.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// A request to reserve one window, with the metadata of the booking to create.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub location_id: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub struct BookingEngine<S: BookingSource> {
    registry: PolicyRegistry,
    source: S,
    settings: SlotSettings,
    max_day_count: u32,
}

impl<S: BookingSource> BookingEngine<S> {
    pub fn new(registry: PolicyRegistry, source: S, settings: SlotSettings) -> Self {
        Self {
            registry,
            source,
            settings,
            max_day_count: DEFAULT_MAX_DAY_COUNT,
        }
    }

    /// Build an engine from a validated configuration document.
    pub fn from_config(config: &EngineConfig, source: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: config.registry()?,
            source,
            settings: config.settings()?,
            max_day_count: config.max_day_count,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn settings(&self) -> &SlotSettings {
        &self.settings
    }

    pub fn policy(&self, location_id: &str) -> Result<&CalendarPolicy> {
        self.registry.get(location_id)
    }

    /// Bookable slots for `query`, ordered by start.
    ///
    /// # Errors
    /// `InvalidLocation`, `InvalidDuration`, `InvalidDayCount` for bad input;
    /// `FetchFailure` when bookings cannot be read.
    pub fn available_slots(
        &self,
        query: &SlotQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<AvailableSlot>> {
        let policy = self.registry.get(&query.location_id)?;
        if query.duration_minutes == 0 {
            return Err(SlotError::InvalidDuration(query.duration_minutes));
        }
        if query.day_count == 0 || query.day_count > self.max_day_count {
            return Err(SlotError::InvalidDayCount {
                count: query.day_count,
                max: self.max_day_count,
            });
        }

        let start_date = query
            .start_date
            .unwrap_or_else(|| time::local_date(now, policy.timezone()));
        let range = fetch_range(start_date, query.day_count)?;

        debug!(
            location = %query.location_id,
            %start_date,
            day_count = query.day_count,
            "slot query"
        );
        let bookings = self.fetch(&range.padded(self.settings.buffer_minutes))?;

        collect_slots(
            start_date,
            query.day_count,
            query.duration_minutes,
            policy,
            &bookings,
            &self.settings,
            now,
        )
    }

    /// Validate one requested window given as raw timestamps.
    pub fn check_window(
        &self,
        location_id: &str,
        start: &str,
        end: &str,
        now: DateTime<Utc>,
    ) -> Result<Availability> {
        let policy = self.registry.get(location_id)?;
        let candidate = TimeWindow::parse(start, end, policy.timezone())?;
        let bookings = self.fetch(&candidate.padded(self.settings.buffer_minutes))?;
        Ok(check_availability(&candidate, policy, &bookings, &self.settings, now))
    }

    /// Reserve the requested window.
    ///
    /// `snapshot` is the booking list the caller last showed the user; when
    /// `None`, one is fetched now. The guard then re-fetches and re-checks before
    /// handing the new record to `commit`, which appends it to the store.
    pub fn reserve<F>(
        &self,
        request: &ReservationRequest,
        snapshot: Option<&[BookingRecord]>,
        now: DateTime<Utc>,
        commit: F,
    ) -> Result<Reservation>
    where
        F: FnOnce(BookingRecord) -> std::result::Result<BookingRecord, CommitError>,
    {
        let policy = self.registry.get(&request.location_id)?;
        let candidate = TimeWindow::parse(&request.start, &request.end, policy.timezone())?;

        let fetched;
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                fetched = self.fetch(&candidate.padded(self.settings.buffer_minutes))?;
                fetched.as_slice()
            }
        };

        let guard = ConflictGuard::new(policy, &self.source, self.settings);
        guard.reserve(&candidate, snapshot, now, |window| {
            let mut record = BookingRecord::new(*window);
            record.title = request.title.clone();
            record.description = request.description.clone();
            commit(record)
        })
    }

    fn fetch(&self, window: &TimeWindow) -> Result<Vec<BookingRecord>> {
        self.source.fetch(window).map_err(|e| {
            warn!(error = %e, "booking fetch failed; availability unknown");
            SlotError::FetchFailure(e)
        })
    }
}

/// A UTC window wide enough to cover `day_count` local days from `start_date` in
/// any timezone.
fn fetch_range(start_date: NaiveDate, day_count: u32) -> Result<TimeWindow> {
    let out_of_range = || SlotError::InvalidDayCount {
        count: day_count,
        max: DEFAULT_MAX_DAY_COUNT,
    };
    let first = start_date.checked_sub_days(Days::new(1)).ok_or_else(out_of_range)?;
    let last = start_date
        .checked_add_days(Days::new(u64::from(day_count) + 1))
        .ok_or_else(out_of_range)?;
    TimeWindow::new(
        first.and_time(NaiveTime::MIN).and_utc(),
        last.and_time(NaiveTime::MIN).and_utc(),
    )
}
