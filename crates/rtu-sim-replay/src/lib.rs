//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "01-bootstrap"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Replay module exports and shared types."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Device replay engine for the RTU data response simulator.
//!
//! Every configured device gets its own worker task. A worker walks its
//! script two lines at a time, emitting the first line as an `RX` request
//! and the second as a `TX` response, and wraps to the start of the script
//! when it runs out.

pub mod cursor;
pub mod emission;
pub mod error;
pub mod faults;
pub mod script;
pub mod simulator;
pub mod stats;
pub mod timing;

pub use cursor::ReplayCursor;
pub use emission::{Direction, Emission, EmissionSink, MemorySink, StdoutSink};
pub use error::{ReplayError, Result};
pub use faults::ResponseDropper;
pub use script::DeviceScript;
pub use simulator::{DeviceReplaySimulator, ShutdownTrigger, SimulatorHandle};
pub use stats::{DeviceReport, ExitReason};
pub use timing::ResponseDelay;
