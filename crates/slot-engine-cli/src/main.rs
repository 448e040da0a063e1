//! `slots` CLI — query free appointment slots, check a window, and reserve it.
//!
//! Locations and generation settings come from a JSON config file. Bookings are
//! read from a JSON calendar export (an array, or an object with `items`).
//!
//! ## Usage
//!
//! ```sh
//! # Free 30-minute slots for the next week
//! slots -c config.json query --location downtown --duration 30 --days 7 -b bookings.json
//!
//! # Is 14:00-14:30 on March 3rd free?
//! slots -c config.json check --location downtown \
//!   --start 2026-03-03T14:00 --end 2026-03-03T14:30 -b bookings.json
//!
//! # Reserve it (appends to bookings.json on success)
//! slots -c config.json reserve --location downtown \
//!   --start 2026-03-03T14:00 --end 2026-03-03T14:30 --title "Haircut" -b bookings.json
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` or pass `--debug`.

mod bookings_file;

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use slot_engine::engine::{BookingEngine, ReservationRequest, SlotQuery};
use slot_engine::{
    group_by_date, BookingRecord, EngineConfig, RejectPhase, Reservation, UnavailableReason,
};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::bookings_file::BookingsFile;

/// Exit status for a reservation turned down for a scheduling reason.
const EXIT_REJECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "slots", version, about = "Appointment slot availability and booking")]
struct Cli {
    /// Engine configuration file (locations, slot step, buffer)
    #[arg(short, long)]
    config: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List bookable slots, grouped by date
    Query {
        #[arg(short, long)]
        location: String,
        /// Slot length in minutes
        #[arg(short, long)]
        duration: u32,
        /// Number of days to search
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// First day to search (YYYY-MM-DD); defaults to today at the location
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Calendar export with existing bookings (none if omitted)
        #[arg(short, long)]
        bookings: Option<String>,
        /// Override the current time (RFC 3339)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Check whether one window can be booked
    Check {
        #[arg(short, long)]
        location: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(short, long)]
        bookings: Option<String>,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Reserve one window, appending it to the bookings file
    Reserve {
        #[arg(short, long)]
        location: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long)]
        bookings: String,
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
}

#[derive(Serialize)]
struct CheckReport<'a> {
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a UnavailableReason>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ReserveReport<'a> {
    Committed {
        booking: &'a BookingRecord,
    },
    Rejected {
        phase: RejectPhase,
        reason: &'a UnavailableReason,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config = EngineConfig::from_json(&raw).context("Invalid engine configuration")?;
    let registry = config.registry()?;

    match cli.command {
        Commands::Query {
            location,
            duration,
            days,
            start,
            bookings,
            now,
        } => {
            let tz = registry.get(&location)?.timezone();
            let store = BookingsFile::new(bookings.as_deref(), tz);
            let engine = BookingEngine::from_config(&config, store)?;
            let query = SlotQuery {
                location_id: location,
                duration_minutes: duration,
                day_count: days,
                start_date: start,
            };
            let slots = engine.available_slots(&query, now.unwrap_or_else(Utc::now))?;
            print_json(&group_by_date(&slots))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            location,
            start,
            end,
            bookings,
            now,
        } => {
            let tz = registry.get(&location)?.timezone();
            let store = BookingsFile::new(bookings.as_deref(), tz);
            let engine = BookingEngine::from_config(&config, store)?;
            let availability =
                engine.check_window(&location, &start, &end, now.unwrap_or_else(Utc::now))?;
            print_json(&CheckReport {
                available: availability.is_available(),
                reason: availability.reason(),
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reserve {
            location,
            start,
            end,
            title,
            description,
            bookings,
            now,
        } => {
            let tz = registry.get(&location)?.timezone();
            let store = BookingsFile::new(Some(&bookings), tz);
            let engine = BookingEngine::from_config(&config, store)?;
            let request = ReservationRequest {
                location_id: location,
                start,
                end,
                title,
                description,
            };

            let now = now.unwrap_or_else(Utc::now);
            let outcome =
                engine.reserve(&request, None, now, |record| engine.source().append(record))?;

            match &outcome {
                Reservation::Committed(booking) => {
                    print_json(&ReserveReport::Committed { booking })?;
                    Ok(ExitCode::SUCCESS)
                }
                Reservation::Rejected { phase, reason } => {
                    print_json(&ReserveReport::Rejected {
                        phase: *phase,
                        reason,
                    })?;
                    Ok(ExitCode::from(EXIT_REJECTED))
                }
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
