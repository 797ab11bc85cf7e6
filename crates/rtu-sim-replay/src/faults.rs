//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Response drop injection for replay workers."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use rand::prelude::*;

/// Decides whether a cycle's response is withheld.
#[derive(Debug)]
pub struct ResponseDropper {
    probability: f64,
    rng: StdRng,
}

impl ResponseDropper {
    /// `probability` is clamped to `[0, 1]`.
    pub fn new(probability: f64, seed: u64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self {
            probability,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0, 0)
    }

    pub fn should_drop(&mut self) -> bool {
        self.probability > 0.0 && self.rng.gen_bool(self.probability)
    }
}
