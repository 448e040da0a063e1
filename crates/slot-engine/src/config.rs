//! Engine configuration: generation settings and the location policy table.
//!
//! Loaded from JSON. Policies are given in a serde-friendly form (timezone names,
//! `HH:MM` strings) and validated into [`CalendarPolicy`] values when the
//! registry is built.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};
use crate::policy::{CalendarPolicy, OpeningHours, PolicyRegistry};
use crate::time;

pub const DEFAULT_SLOT_STEP_MINUTES: u32 = 30;
pub const DEFAULT_MAX_DAY_COUNT: u32 = 366;

/// Generation-time parameters shared by the generator and the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSettings {
    /// Granularity of offered start times, aligned to the wall clock.
    pub step_minutes: u32,
    /// Minimum gap kept on each side of an existing booking.
    pub buffer_minutes: u32,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            step_minutes: DEFAULT_SLOT_STEP_MINUTES,
            buffer_minutes: 0,
        }
    }
}

impl SlotSettings {
    pub fn new(step_minutes: u32, buffer_minutes: u32) -> Result<Self> {
        if step_minutes == 0 {
            return Err(SlotError::InvalidConfig(
                "slot step must be at least one minute".to_string(),
            ));
        }
        Ok(Self {
            step_minutes,
            buffer_minutes,
        })
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub slot_step_minutes: u32,
    pub buffer_minutes: u32,
    /// Upper bound on the number of days one slot query may span.
    pub max_day_count: u32,
    pub locations: Vec<LocationConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_step_minutes: DEFAULT_SLOT_STEP_MINUTES,
            buffer_minutes: 0,
            max_day_count: DEFAULT_MAX_DAY_COUNT,
            locations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub id: String,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Weekly {
        open_weekdays: Vec<u8>,
        open: String,
        close: String,
        timezone: String,
    },
    ExplicitDates {
        allowed_dates: Vec<NaiveDate>,
        open: String,
        close: String,
        timezone: String,
    },
}

impl PolicyConfig {
    /// Validate into a [`CalendarPolicy`].
    pub fn to_policy(&self) -> Result<CalendarPolicy> {
        match self {
            PolicyConfig::Weekly {
                open_weekdays,
                open,
                close,
                timezone,
            } => CalendarPolicy::weekly(
                open_weekdays.iter().copied(),
                parse_hours(open, close)?,
                time::parse_timezone(timezone)?,
            ),
            PolicyConfig::ExplicitDates {
                allowed_dates,
                open,
                close,
                timezone,
            } => Ok(CalendarPolicy::explicit_dates(
                allowed_dates.iter().copied(),
                parse_hours(open, close)?,
                time::parse_timezone(timezone)?,
            )),
        }
    }
}

fn parse_hours(open: &str, close: &str) -> Result<OpeningHours> {
    OpeningHours::new(parse_clock(open)?, parse_clock(close)?)
}

fn parse_clock(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| {
            SlotError::InvalidConfig(format!("invalid clock time '{}', expected HH:MM", raw))
        })
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| SlotError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.settings()?;
        if self.max_day_count == 0 {
            return Err(SlotError::InvalidConfig(
                "max_day_count must be at least 1".to_string(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for location in &self.locations {
            if !seen.insert(location.id.as_str()) {
                return Err(SlotError::InvalidConfig(format!(
                    "duplicate location id '{}'",
                    location.id
                )));
            }
            location.policy.to_policy()?;
        }
        Ok(())
    }

    pub fn settings(&self) -> Result<SlotSettings> {
        SlotSettings::new(self.slot_step_minutes, self.buffer_minutes)
    }

    /// Build the location policy table.
    pub fn registry(&self) -> Result<PolicyRegistry> {
        let mut registry = PolicyRegistry::new();
        for location in &self.locations {
            registry.insert(location.id.clone(), location.policy.to_policy()?);
        }
        Ok(registry)
    }
}
