//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Response delay selection for replay workers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use rand::prelude::*;
use rtu_sim_common::config::{DelayMode, TimingConfig};

/// Chooses the pause between a request and its response.
#[derive(Debug)]
pub struct ResponseDelay {
    mode: DelayMode,
    midpoint: Duration,
    min: Duration,
    max: Duration,
    rng: StdRng,
}

impl ResponseDelay {
    pub fn from_timing(timing: &TimingConfig, seed: u64) -> Self {
        Self {
            mode: timing.delay_mode,
            midpoint: timing.response_delay_midpoint(),
            min: timing.response_delay_min,
            max: timing.response_delay_max,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn midpoint(&self) -> Duration {
        self.midpoint
    }

    pub fn next(&mut self) -> Duration {
        match self.mode {
            DelayMode::Midpoint => self.midpoint,
            DelayMode::Uniform if self.min >= self.max => self.min,
            DelayMode::Uniform => self.rng.gen_range(self.min..=self.max),
        }
    }
}
