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

use log::info;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag::register,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use crate::model::Model;
use crate::utility::get_parameter;

/// Run the application.
///
/// # Arguments
/// * `period_ms` - Tick period in milliseconds to override the
/// configuration file. If the value is 0, the period is read from the
/// configuration file.
/// * `telemetry_file` - Telemetry CSV file to override the configuration
/// file.
/// * `is_simulation_mode` - Is the simulation mode or not.
pub fn run(period_ms: u64, telemetry_file: Option<&Path>, is_simulation_mode: bool) {
    // Log the running mode
    let mode = if is_simulation_mode {
        "simulation mode"
    } else {
        "hardware mode"
    };
    info!("Run the FrED control system in {mode}.");

    // Decide the telemetry file
    let config_file = Path::new("config/parameters_app.yaml");
    let final_telemetry_file = get_final_telemetry_file(config_file, telemetry_file);

    // Create the model
    let mut model = Model::new(is_simulation_mode, period_ms, Some(&final_telemetry_file));

    // Register the signals that stop the application
    for signal in [SIGTERM, SIGINT].iter() {
        let _ = register(*signal, model.stop.clone());
    }

    // Run the processes
    model.run_processes();

    // Run the main loop
    while !model.stop.load(Ordering::Relaxed) {
        model.step();
    }

    info!("Stopping the FrED control system...");

    // Stop the threads. The control loop writes the safe outputs on the way
    // out.
    model.stop();

    info!("FrED control system should be stopped.");
}

/// Get the final telemetry file.
///
/// # Arguments
/// * `config_file` - Configuration file.
/// * `telemetry_file` - Telemetry CSV file. If None, the file is read from
/// the configuration file.
///
/// # Returns
/// Final telemetry file.
fn get_final_telemetry_file(config_file: &Path, telemetry_file: Option<&Path>) -> PathBuf {
    match telemetry_file {
        Some(filepath) => filepath.to_path_buf(),
        None => PathBuf::from(get_parameter::<String>(config_file, "telemetry_file")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_final_telemetry_file() {
        let config_file = Path::new("config/parameters_app.yaml");

        let final_telemetry_file = get_final_telemetry_file(config_file, None);

        assert_eq!(final_telemetry_file, PathBuf::from("fred_telemetry.csv"));

        let final_telemetry_file =
            get_final_telemetry_file(config_file, Some(Path::new("run.csv")));

        assert_eq!(final_telemetry_file, PathBuf::from("run.csv"));
    }
}
