//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the simulator runtime."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

/// Wall-clock layout used in emission lines, e.g. `2024-05-01 13:45:07.042`.
pub const EMISSION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Capture the local wall-clock time for an emission.
pub fn wall_clock_now() -> DateTime<Local> {
    Local::now()
}

/// Render a timestamp with millisecond precision.
pub fn format_millis<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.format(EMISSION_TIMESTAMP_FORMAT).to_string()
}

/// Convert a duration into milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
