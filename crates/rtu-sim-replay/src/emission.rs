//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Emission records and output sinks for replayed traffic."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rtu_sim_common::time::format_millis;
use strum::{Display, EnumString};

use crate::error::Result;

/// Traffic direction as seen from the simulated RTU client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Direction {
    #[strum(serialize = "RX")]
    Rx,
    #[strum(serialize = "TX")]
    Tx,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Rx => "Request",
            Direction::Tx => "Response",
        }
    }
}

/// One replayed log line.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub direction: Direction,
    pub device: String,
    pub payload: String,
    pub timestamp: DateTime<Local>,
    /// Zero-based cycle the emission belongs to.
    pub cycle: u64,
    /// Monotonic time since the simulator started.
    pub elapsed: Duration,
}

impl Emission {
    /// Render the stdout line, e.g.
    /// `RX [2024-05-01 13:45:07.042][DEBUG][TCP_Client.py:171] >> BMS(Request): 01 03 00 00`.
    pub fn render(&self, source_tag: &str) -> String {
        format!(
            "{} [{}][DEBUG][{}] >> {}({}): {}",
            self.direction,
            format_millis(&self.timestamp),
            source_tag,
            self.device,
            self.direction.label(),
            self.payload
        )
    }
}

/// Destination for emissions. Shared by every device worker.
pub trait EmissionSink: Send + Sync {
    fn emit(&self, emission: &Emission) -> Result<()>;
}

/// Writes each emission as one line on standard output.
#[derive(Debug, Clone)]
pub struct StdoutSink {
    source_tag: String,
}

impl StdoutSink {
    pub fn new(source_tag: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
        }
    }
}

impl EmissionSink for StdoutSink {
    fn emit(&self, emission: &Emission) -> Result<()> {
        let line = emission.render(&self.source_tag);
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

/// In-memory sink that records emissions in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    emissions: Mutex<Vec<Emission>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().clone()
    }

    pub fn for_device(&self, device: &str) -> Vec<Emission> {
        self.emissions
            .lock()
            .iter()
            .filter(|emission| emission.device == device)
            .cloned()
            .collect()
    }

    pub fn payloads(&self, device: &str) -> Vec<(Direction, String)> {
        self.for_device(device)
            .into_iter()
            .map(|emission| (emission.direction, emission.payload))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.emissions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.emissions.lock().is_empty()
    }
}

impl EmissionSink for MemorySink {
    fn emit(&self, emission: &Emission) -> Result<()> {
        self.emissions.lock().push(emission.clone());
        Ok(())
    }
}
