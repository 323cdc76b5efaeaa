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

use std::collections::HashMap;
use std::path::Path;

use strum::IntoEnumIterator;

use crate::control::pid::PidGains;
use crate::enums::ControlChannelId;
use crate::utility::{get_parameter, get_parameter_array};

#[derive(Clone, PartialEq, Debug)]
pub struct Config {
    // Configuration filename.
    pub filename: String,
    // Control frequency in Hz.
    pub control_frequency: f64,
    // Consecutive stale ticks before the diameter channel is forced to the
    // open-loop control.
    pub max_stale_ticks: i32,
    // Minimum number of samples averaged by a calibration.
    pub calibration_min_samples: usize,
    // Ticks before a running calibration times out.
    pub calibration_timeout_ticks: i32,
    // Enabled faults mask.
    pub enabled_faults_mask: u64,
    // File that holds the persisted settings.
    pub settings_file: String,
    // Output limits in percent of the PWM duty cycle: (min, max).
    pub output_limits: HashMap<ControlChannelId, (f64, f64)>,
    // Setpoint limits in the channel-specific unit: (min, max).
    pub setpoint_limits: HashMap<ControlChannelId, (f64, f64)>,
    // Default setpoints in the channel-specific unit.
    pub default_setpoints: HashMap<ControlChannelId, f64>,
    // Default controller gains.
    pub default_gains: HashMap<ControlChannelId, PidGains>,
}

impl Config {
    /// Create a new config object.
    ///
    /// # Arguments
    /// * `filepath_parameters_control` - The path to the control parameters
    /// file.
    ///
    /// # Returns
    /// A new config object.
    pub fn new(filepath_parameters_control: &Path) -> Self {
        Self {
            filename: String::from(filepath_parameters_control.to_str().expect(&format!(
                "Should be able to convert {:?} to a string",
                filepath_parameters_control
            ))),

            control_frequency: get_parameter(filepath_parameters_control, "control_frequency"),
            max_stale_ticks: get_parameter(filepath_parameters_control, "max_stale_ticks"),

            calibration_min_samples: get_parameter(
                filepath_parameters_control,
                "calibration_min_samples",
            ),
            calibration_timeout_ticks: get_parameter(
                filepath_parameters_control,
                "calibration_timeout_ticks",
            ),

            enabled_faults_mask: get_parameter(filepath_parameters_control, "enabled_faults_mask"),

            settings_file: get_parameter(filepath_parameters_control, "settings_file"),

            output_limits: Self::read_channel_limits(filepath_parameters_control, "output_limit"),
            setpoint_limits: Self::read_channel_limits(
                filepath_parameters_control,
                "setpoint_limit",
            ),
            default_setpoints: Self::read_channel_setpoints(filepath_parameters_control),
            default_gains: Self::read_channel_gains(filepath_parameters_control),
        }
    }

    /// Read the per-channel (min, max) limits from the configuration file.
    ///
    /// # Arguments
    /// * `filepath_parameters_control` - The path to the control parameters
    /// file.
    /// * `prefix` - Prefix of the configuration key.
    ///
    /// # Returns
    /// Limits keyed by the control channel.
    fn read_channel_limits(
        filepath_parameters_control: &Path,
        prefix: &str,
    ) -> HashMap<ControlChannelId, (f64, f64)> {
        let mut limits = HashMap::new();
        for channel in ControlChannelId::iter() {
            let values: Vec<f64> = get_parameter_array(
                filepath_parameters_control,
                &format!("{prefix}_{}", channel.as_ref()),
            );
            assert_eq!(values.len(), 2);
            assert!(values[0] < values[1]);

            limits.insert(channel, (values[0], values[1]));
        }

        limits
    }

    /// Read the per-channel default setpoints from the configuration file.
    ///
    /// # Arguments
    /// * `filepath_parameters_control` - The path to the control parameters
    /// file.
    ///
    /// # Returns
    /// Default setpoints keyed by the control channel.
    fn read_channel_setpoints(
        filepath_parameters_control: &Path,
    ) -> HashMap<ControlChannelId, f64> {
        let mut setpoints = HashMap::new();
        for channel in ControlChannelId::iter() {
            setpoints.insert(
                channel,
                get_parameter(
                    filepath_parameters_control,
                    &format!("default_setpoint_{}", channel.as_ref()),
                ),
            );
        }

        setpoints
    }

    /// Read the per-channel default gains from the configuration file.
    ///
    /// # Arguments
    /// * `filepath_parameters_control` - The path to the control parameters
    /// file.
    ///
    /// # Returns
    /// Default gains keyed by the control channel.
    fn read_channel_gains(
        filepath_parameters_control: &Path,
    ) -> HashMap<ControlChannelId, PidGains> {
        let mut gains = HashMap::new();
        for channel in ControlChannelId::iter() {
            let values: Vec<f64> = get_parameter_array(
                filepath_parameters_control,
                &format!("default_gains_{}", channel.as_ref()),
            );
            assert_eq!(values.len(), 3);

            gains.insert(
                channel,
                PidGains {
                    kp: values[0],
                    ki: values[1],
                    kd: values[2],
                },
            );
        }

        gains
    }

    /// Get the tick period.
    ///
    /// # Returns
    /// Tick period in milliseconds.
    pub fn tick_period_ms(&self) -> u64 {
        (1000.0 / self.control_frequency) as u64
    }
}
