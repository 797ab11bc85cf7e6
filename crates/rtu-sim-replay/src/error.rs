//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Error types for the device replay engine."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplayError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("script {} for device {device} not found", .path.display())]
    ScriptNotFound { device: String, path: PathBuf },
    #[error("script {} for device {device} contains no non-empty lines", .path.display())]
    EmptyScript { device: String, path: PathBuf },
    #[error("unable to read script {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("emission sink failed: {0}")]
    Sink(#[from] std::io::Error),
}
