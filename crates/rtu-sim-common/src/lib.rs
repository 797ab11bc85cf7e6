//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the simulator runtime."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the RTU data response simulator.
//! This crate exposes configuration loading, logging bootstrap, and the
//! timestamp helpers used when rendering emissions.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    DelayMode, DeviceConfig, LoadedSimulatorConfig, LoggingConfig, OutputConfig, SimulatorConfig,
    TimingConfig,
};
pub use logging::{init_tracing, LogFormat};
