//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Per-device replay counters reported on shutdown."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use strum::Display;

/// Why a device worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExitReason {
    /// Shutdown was signalled.
    Cancelled,
    /// The configured `max_cycles` was reached.
    CycleLimit,
    /// The script was missing, unreadable, or empty.
    NoScript,
    /// The emission sink returned an error.
    SinkFailed,
}

/// Counters owned by a single worker and handed back when it finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub device: String,
    pub requests: u64,
    pub responses: u64,
    pub dropped: u64,
    /// Request-to-response interval of the most recent answered cycle.
    pub last_interval: Option<Duration>,
    pub exit: ExitReason,
    completed: u64,
}

impl DeviceReport {
    pub(crate) fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            requests: 0,
            responses: 0,
            dropped: 0,
            last_interval: None,
            exit: ExitReason::Cancelled,
            completed: 0,
        }
    }

    pub(crate) fn record_request(&mut self) {
        self.requests += 1;
    }

    pub(crate) fn record_response(&mut self, interval: Duration) {
        self.responses += 1;
        self.last_interval = Some(interval);
    }

    pub(crate) fn record_drop(&mut self) {
        self.dropped += 1;
    }

    pub(crate) fn record_cycle(&mut self) {
        self.completed += 1;
    }

    pub(crate) fn finish(mut self, exit: ExitReason) -> Self {
        self.exit = exit;
        self
    }

    /// Cycles that ran through their response step and advanced the cursor.
    pub fn cycles(&self) -> u64 {
        self.completed
    }

    /// Answered requests in percent; zero when nothing was requested.
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.responses as f64 / self.requests as f64 * 100.0
    }
}
