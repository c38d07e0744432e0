//! Persisted runtime-state record.
//!
//! One small JSON file per project, overwritten on each successful
//! bring-up, so later commands (`down`, `status`, `logs`) stay consistent
//! with the flags the environment was started with.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

/// Last-run record: which profile was brought up, through which runtime,
/// and whether the telemetry stack was enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Profile name the environment was started with.
    pub profile: String,
    /// Runtime driver name (e.g. "docker").
    pub runtime: String,
    /// Whether the telemetry stack was injected.
    pub telemetry: bool,
}

impl RunState {
    /// Loads the record from `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist — a missing record is
    /// normal before the first bring-up.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(path).map_err(|e| CommonError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let state = serde_json::from_slice(&data).map_err(|e| CommonError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Some(state))
    }

    /// Writes the record to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CommonError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let data = serde_json::to_vec_pretty(self).map_err(|e| CommonError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, data).map_err(|e| CommonError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
