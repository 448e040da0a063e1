//! A JSON bookings file used as the external booking store.
//!
//! Every fetch re-reads the file, so the re-check before a commit sees bookings
//! written by other processes. Reads take a shared advisory lock; an append
//! takes the exclusive lock and re-checks for overlaps before it writes, so two
//! `slots reserve` runs on the same file cannot both commit one window.
//!
//! Appends touch only the list of items: the envelope object, cancelled items
//! and any fields the engine does not model are written back as they were read.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use fd_lock::RwLock;
use serde_json::Value;
use slot_engine::{
    parse_bookings, BookingRecord, BookingSource, CommitError, FetchError, TimeWindow,
};
use tracing::debug;

pub struct BookingsFile {
    path: Option<PathBuf>,
    tz: Tz,
}

impl BookingsFile {
    /// A store backed by `path`. `None` means a calendar with no bookings.
    pub fn new(path: Option<&str>, tz: Tz) -> Self {
        Self {
            path: path.map(PathBuf::from),
            tz,
        }
    }

    /// Append `record` to the file unless it overlaps a stored booking.
    ///
    /// The read, the overlap test and the write all happen under the exclusive
    /// lock. A missing file is created holding a bare array.
    pub fn append(&self, record: BookingRecord) -> Result<BookingRecord, CommitError> {
        let Some(path) = &self.path else {
            return Err(CommitError::Unavailable("no bookings file given".to_string()));
        };
        let unavailable =
            |e: std::io::Error| CommitError::Unavailable(format!("{}: {}", path.display(), e));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(unavailable)?;
        let mut lock = RwLock::new(file);
        let mut guard = lock.write().map_err(unavailable)?;

        let mut raw = String::new();
        guard.read_to_string(&mut raw).map_err(unavailable)?;

        let existing = self
            .parse(&raw)
            .map_err(|e| CommitError::Unavailable(format!("{}: {}", path.display(), e)))?;
        if let Some(clash) = existing.into_iter().find(|b| b.window.overlaps(&record.window)) {
            debug!(path = %path.display(), clash = ?clash.id, "append refused: overlap");
            return Err(CommitError::Conflict(Some(clash)));
        }

        let mut document = if raw.trim().is_empty() {
            Value::Array(Vec::new())
        } else {
            serde_json::from_str(&raw).map_err(|e| CommitError::Unavailable(e.to_string()))?
        };
        let item =
            serde_json::to_value(&record).map_err(|e| CommitError::Unavailable(e.to_string()))?;
        items_mut(&mut document)
            .ok_or_else(|| {
                CommitError::Unavailable(format!(
                    "{}: expected an array or an object with an `items` array",
                    path.display()
                ))
            })?
            .push(item);

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| CommitError::Unavailable(e.to_string()))?;
        guard.set_len(0).map_err(unavailable)?;
        guard.seek(SeekFrom::Start(0)).map_err(unavailable)?;
        guard.write_all(json.as_bytes()).map_err(unavailable)?;
        guard.write_all(b"\n").map_err(unavailable)?;
        guard.sync_all().map_err(unavailable)?;

        debug!(path = %path.display(), start = %record.start(), "appended booking");
        Ok(record)
    }

    fn parse(&self, raw: &str) -> slot_engine::error::Result<Vec<BookingRecord>> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_bookings(raw, self.tz)
    }
}

impl BookingSource for BookingsFile {
    fn fetch(&self, window: &TimeWindow) -> Result<Vec<BookingRecord>, FetchError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            debug!(path = %path.display(), "bookings file does not exist yet; no bookings");
            return Ok(Vec::new());
        }

        let unreachable = |e: &dyn std::fmt::Display| {
            FetchError::Unreachable(format!("{}: {}", path.display(), e))
        };
        let raw = read_shared(path).map_err(|e| unreachable(&e))?;
        let bookings = self.parse(&raw).map_err(|e| unreachable(&e))?;
        debug!(path = %path.display(), count = bookings.len(), "read bookings");

        Ok(bookings.into_iter().filter(|b| b.window.overlaps(window)).collect())
    }
}

fn read_shared(path: &Path) -> std::io::Result<String> {
    let lock = RwLock::new(File::open(path)?);
    let guard = lock.read()?;
    let mut raw = String::new();
    (&*guard).read_to_string(&mut raw)?;
    Ok(raw)
}

/// The list new bookings are pushed onto: the document itself, or its `items`.
fn items_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    match document {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get_mut("items").and_then(Value::as_array_mut),
        _ => None,
    }
}
