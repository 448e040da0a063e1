//! Committed bookings and validation of loosely-typed calendar payloads.
//!
//! Bookings come from an external calendar as JSON. Nothing from that payload is
//! trusted at point of use: [`parse_bookings`] turns it into typed
//! [`BookingRecord`]s or a structured `InvalidBooking` error naming the item.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SlotError};
use crate::time;
use crate::window::TimeWindow;

/// A booking already committed to the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub window: TimeWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BookingRecord {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            id: None,
            window,
            title: None,
            description: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.window.start()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.window.end()
    }
}

/// Parse a calendar payload into bookings.
///
/// The payload is either an array of items or an object with an `items` array.
/// Each item needs `start` and `end`, given as a timestamp string,
/// `{"dateTime": "..."}`, or an all-day `{"date": "YYYY-MM-DD"}`. Optional
/// fields: `id`, `title` (or `summary`), `description`. Items with
/// `"status": "cancelled"` are skipped.
///
/// # Errors
/// Returns `SlotError::InvalidBooking` for the first malformed item, or when the
/// payload itself is not JSON of the expected shape.
pub fn parse_bookings(json: &str, tz: Tz) -> Result<Vec<BookingRecord>> {
    let value: Value = serde_json::from_str(json).map_err(|e| SlotError::InvalidBooking {
        index: 0,
        message: format!("payload is not valid JSON: {}", e),
    })?;

    let items = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => {
                return Err(SlotError::InvalidBooking {
                    index: 0,
                    message: "expected an array or an object with an `items` array".to_string(),
                })
            }
        },
        _ => {
            return Err(SlotError::InvalidBooking {
                index: 0,
                message: "expected an array or an object with an `items` array".to_string(),
            })
        }
    };

    let mut bookings = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if item.get("status").and_then(Value::as_str) == Some("cancelled") {
            continue;
        }
        bookings.push(parse_item(index, item, tz)?);
    }
    Ok(bookings)
}

fn parse_item(index: usize, item: &Value, tz: Tz) -> Result<BookingRecord> {
    let invalid = |message: String| SlotError::InvalidBooking { index, message };

    if !item.is_object() {
        return Err(invalid("item is not an object".to_string()));
    }

    let start =
        parse_boundary(item.get("start"), tz).map_err(|m| invalid(format!("start: {}", m)))?;
    let mut end =
        parse_boundary(item.get("end"), tz).map_err(|m| invalid(format!("end: {}", m)))?;

    // An all-day item whose end date equals its start date covers that one day.
    if end.instant == start.instant && start.all_day {
        end.instant = start.instant + chrono::Duration::days(1);
    }

    let window = TimeWindow::new(start.instant, end.instant).map_err(|e| invalid(e.to_string()))?;

    let mut record = BookingRecord::new(window);
    record.id = match item.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    record.title = item
        .get("title")
        .or_else(|| item.get("summary"))
        .and_then(Value::as_str)
        .map(str::to_string);
    record.description = item
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(record)
}

struct Boundary {
    instant: DateTime<Utc>,
    all_day: bool,
}

fn parse_boundary(field: Option<&Value>, tz: Tz) -> std::result::Result<Boundary, String> {
    match field {
        None | Some(Value::Null) => Err("missing".to_string()),
        Some(Value::String(raw)) => time::normalize_utc(raw, tz)
            .map(|instant| Boundary { instant, all_day: false })
            .map_err(|e| e.to_string()),
        Some(Value::Object(map)) => {
            if let Some(raw) = map.get("dateTime").and_then(Value::as_str) {
                return time::normalize_utc(raw, tz)
                    .map(|instant| Boundary { instant, all_day: false })
                    .map_err(|e| e.to_string());
            }
            if let Some(raw) = map.get("date").and_then(Value::as_str) {
                let date = time::parse_date(raw).map_err(|e| e.to_string())?;
                return time::local_instant(tz, date, NaiveTime::MIN)
                    .map(|instant| Boundary { instant, all_day: true })
                    .ok_or_else(|| format!("midnight does not exist on {} in {}", date, tz.name()));
            }
            Err("expected `dateTime` or `date`".to_string())
        }
        Some(_) => Err("expected a timestamp string or object".to_string()),
    }
}
