// This file is part of fred_controller.
//
// Developed for the FrED fiber extrusion device.
// See the COPYRIGHT file at the top-level directory of this distribution
// for details of code ownership.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::control::pid::PidGains;

/// Settings that survive a restart: the active calibration coefficient and
/// the last-used gains keyed by the channel name. Read at the startup and
/// written on a successful calibration or a gain edit.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct PersistedSettings {
    // Calibration coefficient in mm/pixel. None if the camera has never
    // been calibrated on this installation.
    pub calibration_coefficient: Option<f64>,
    // Controller gains keyed by the channel name.
    pub gains: HashMap<String, PidGains>,
}

pub struct SettingsStore {
    // File that holds the persisted settings.
    _filepath: PathBuf,
}

impl SettingsStore {
    /// Create a new settings store.
    ///
    /// # Arguments
    /// * `filepath` - File that holds the persisted settings.
    ///
    /// # Returns
    /// A new settings store.
    pub fn new(filepath: &Path) -> Self {
        Self {
            _filepath: filepath.to_path_buf(),
        }
    }

    /// Load the persisted settings. A missing or unreadable file yields the
    /// default settings so a fresh installation starts cleanly.
    ///
    /// # Returns
    /// The persisted settings.
    pub fn load(&self) -> PersistedSettings {
        let contents = match fs::read_to_string(&self._filepath) {
            Ok(contents) => contents,
            Err(_) => {
                return PersistedSettings::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(
                    "Failed to parse the persisted settings in {:?}: {error}.",
                    self._filepath
                );

                PersistedSettings::default()
            }
        }
    }

    /// Save the persisted settings.
    ///
    /// # Arguments
    /// * `settings` - Settings to save.
    ///
    /// # Errors
    /// If the settings cannot be serialized or written.
    pub fn save(&self, settings: &PersistedSettings) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(settings)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;

        fs::write(&self._filepath, contents)
    }
}
