//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Cursor arithmetic for paired request/response replay."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---

/// Position tracker into a device script.
///
/// The base position starts at zero and moves forward by [`ReplayCursor::STRIDE`]
/// after every cycle. It is never reset; indices are taken as
/// `(base + offset) mod len`, and `len == 0` yields `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayCursor {
    base: u64,
}

impl ReplayCursor {
    /// Lines consumed per cycle: one request and one response.
    pub const STRIDE: u64 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor positioned at the start of the given cycle.
    pub fn at_cycle(cycle: u64) -> Self {
        Self {
            base: cycle.wrapping_mul(Self::STRIDE),
        }
    }

    pub fn position(&self) -> u64 {
        self.base
    }

    pub fn cycle(&self) -> u64 {
        self.base / Self::STRIDE
    }

    pub fn index(&self, offset: u64, len: usize) -> Option<usize> {
        let len = u64::try_from(len).ok()?;
        let index = self.base.wrapping_add(offset).checked_rem(len)?;
        usize::try_from(index).ok()
    }

    pub fn request_index(&self, len: usize) -> Option<usize> {
        self.index(0, len)
    }

    pub fn response_index(&self, len: usize) -> Option<usize> {
        self.index(1, len)
    }

    pub fn advance(&mut self) {
        self.base = self.base.wrapping_add(Self::STRIDE);
    }
}
