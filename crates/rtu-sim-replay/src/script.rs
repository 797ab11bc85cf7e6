//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Script loading for replayed device traffic."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::cursor::ReplayCursor;
use crate::error::{ReplayError, Result};

/// Immutable, pre-loaded payload lines for one device.
///
/// Lines are trimmed and blank lines are discarded, so a loaded script is
/// never empty.
#[derive(Debug, Clone)]
pub struct DeviceScript {
    device: String,
    path: PathBuf,
    lines: Vec<String>,
}

impl DeviceScript {
    /// Read a newline-delimited UTF-8 script from disk.
    pub fn load(device: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let device = device.into();
        let path = path.as_ref().to_path_buf();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ReplayError::ScriptNotFound { device, path });
            }
            Err(source) => return Err(ReplayError::Io { path, source }),
        };
        Self::from_lines(device, path, contents.lines())
    }

    /// Build a script from in-memory lines using the same filtering as [`DeviceScript::load`].
    pub fn from_lines<I, S>(device: impl Into<String>, path: impl Into<PathBuf>, lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let device = device.into();
        let path = path.into();
        let lines: Vec<String> = lines
            .into_iter()
            .filter_map(|line| {
                let trimmed = line.as_ref().trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            })
            .collect();
        if lines.is_empty() {
            return Err(ReplayError::EmptyScript { device, path });
        }
        Ok(Self {
            device,
            path,
            lines,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Request and response payloads selected by the cursor's current position.
    pub fn pair(&self, cursor: &ReplayCursor) -> Option<(&str, &str)> {
        let request = cursor.request_index(self.len())?;
        let response = cursor.response_index(self.len())?;
        Some((&self.lines[request], &self.lines[response]))
    }
}
