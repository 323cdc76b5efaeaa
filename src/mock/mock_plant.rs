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
use std::sync::{Arc, Mutex};

use strum::IntoEnumIterator;

use crate::constants::PWM_FULL_SCALE;
use crate::control::math_tool::clip;
use crate::enums::{BitEnum, BreakLevel, ControlChannelId};
use crate::interface::device::{ActuatorDevice, DeviceFault, SensorReadings};
use crate::mock::mock_constants::{
    PLANT_COOLING_RATE, PLANT_DIAMETER_GAIN, PLANT_EXTRUDER_MAX_RPM, PLANT_FAN_COOLING_RATE,
    PLANT_FAN_MAX_RPM, PLANT_HEATER_GAIN, PLANT_MOTOR_TIME_CONSTANT, PLANT_SPOOL_MAX_RPM,
};

/// Mock plant model to simulate the rig's actuators and sensor data: the
/// motors and the fan follow the commanded duty with a first-order lag, the
/// heater integrates toward a duty-dependent temperature, and the fiber
/// diameter follows the draw ratio between the extrusion and the spooling.
pub struct MockPlant {
    // Ambient temperature in degree Celsius.
    _ambient_temperature_c: f64,
    // Heater temperature in degree Celsius.
    pub temperature_c: f64,
    // Extrusion motor speed in RPM.
    pub extruder_rpm: f64,
    // Spooling motor speed in RPM.
    pub spool_rpm: f64,
    // Fan speed in RPM.
    pub fan_rpm: f64,
    // Commanded duty in percent per channel.
    _duties: HashMap<ControlChannelId, f64>,
    // The device is available or not. Used to inject write faults.
    pub is_device_available: bool,
    // Asserted break levels as a bitmask.
    _asserted_break_levels: u8,
}

impl MockPlant {
    /// Create a new mock plant.
    ///
    /// # Arguments
    /// * `ambient_temperature_c` - Ambient temperature in degree Celsius.
    ///
    /// # Returns
    /// A new mock plant.
    pub fn new(ambient_temperature_c: f64) -> Self {
        let mut duties = HashMap::new();
        for channel in ControlChannelId::iter() {
            duties.insert(channel, 0.0);
        }

        Self {
            _ambient_temperature_c: ambient_temperature_c,
            temperature_c: ambient_temperature_c,
            extruder_rpm: 0.0,
            spool_rpm: 0.0,
            fan_rpm: 0.0,
            _duties: duties,
            is_device_available: true,
            _asserted_break_levels: 0,
        }
    }

    /// Set the commanded duty of the channel.
    ///
    /// # Arguments
    /// * `channel` - Control channel.
    /// * `duty` - Duty in percent.
    pub fn set_duty(&mut self, channel: ControlChannelId, duty: f64) {
        self._duties.insert(channel, clip(duty, 0.0, 100.0));
    }

    /// Get the commanded duty of the channel.
    ///
    /// # Arguments
    /// * `channel` - Control channel.
    ///
    /// # Returns
    /// Duty in percent.
    pub fn commanded_duty(&self, channel: ControlChannelId) -> f64 {
        self._duties[&channel]
    }

    /// Advance the plant dynamics.
    ///
    /// # Arguments
    /// * `dt` - Elapsed time in second.
    pub fn update(&mut self, dt: f64) {
        let lag = dt / (dt + PLANT_MOTOR_TIME_CONSTANT);

        let target_extruder =
            self._duties[&ControlChannelId::ExtrusionMotor] / 100.0 * PLANT_EXTRUDER_MAX_RPM;
        self.extruder_rpm += (target_extruder - self.extruder_rpm) * lag;

        let target_spool =
            self._duties[&ControlChannelId::SpoolMotor] / 100.0 * PLANT_SPOOL_MAX_RPM;
        self.spool_rpm += (target_spool - self.spool_rpm) * lag;

        let target_fan = self._duties[&ControlChannelId::Fan] / 100.0 * PLANT_FAN_MAX_RPM;
        self.fan_rpm += (target_fan - self.fan_rpm) * lag;

        let heating = self._duties[&ControlChannelId::Heater] / 100.0 * PLANT_HEATER_GAIN;
        let cooling_rate =
            PLANT_COOLING_RATE + PLANT_FAN_COOLING_RATE * self._duties[&ControlChannelId::Fan] / 100.0;
        self.temperature_c +=
            (heating - cooling_rate * (self.temperature_c - self._ambient_temperature_c)) * dt;
    }

    /// Get the fiber diameter. The diameter falls as the spooling speeds up
    /// relative to the extrusion.
    ///
    /// # Returns
    /// Fiber diameter in millimeter.
    pub fn diameter_mm(&self) -> f64 {
        let spool_rpm = self.spool_rpm.max(0.1);
        let extruder_rpm = self.extruder_rpm.max(0.0);

        clip(
            PLANT_DIAMETER_GAIN * (extruder_rpm / spool_rpm).sqrt(),
            0.05,
            1.0,
        )
    }

    /// Assert a break level of the safety sensor chain.
    ///
    /// # Arguments
    /// * `level` - Break level.
    pub fn assert_break_level(&mut self, level: BreakLevel) {
        self._asserted_break_levels |= level.bit_value();
    }

    /// Release a break level of the safety sensor chain.
    ///
    /// # Arguments
    /// * `level` - Break level.
    pub fn release_break_level(&mut self, level: BreakLevel) {
        self._asserted_break_levels &= !level.bit_value();
    }

    /// Get the asserted break levels.
    ///
    /// # Returns
    /// Asserted break levels as a bitmask.
    pub fn asserted_break_levels(&self) -> u8 {
        self._asserted_break_levels
    }
}

/// Actuator device backed by the mock plant. The plant is shared with the
/// camera acquisition thread, which drives the plant dynamics.
pub struct MockPlantDevice {
    _plant: Arc<Mutex<MockPlant>>,
}

impl MockPlantDevice {
    /// Create a new mock plant device.
    ///
    /// # Arguments
    /// * `plant` - The mock plant.
    ///
    /// # Returns
    /// A new mock plant device.
    pub fn new(plant: &Arc<Mutex<MockPlant>>) -> Self {
        Self {
            _plant: plant.clone(),
        }
    }
}

impl ActuatorDevice for MockPlantDevice {
    fn write(&mut self, channel: ControlChannelId, counts: u16) -> Result<(), DeviceFault> {
        let mut plant = self._plant.lock().expect("Mock plant should lock.");

        if !plant.is_device_available {
            return Err(DeviceFault {
                channel: channel,
                reason: String::from("The device is unavailable."),
            });
        }

        plant.set_duty(channel, (counts as f64) / PWM_FULL_SCALE * 100.0);

        Ok(())
    }

    fn read_sensors(&mut self) -> SensorReadings {
        let plant = self._plant.lock().expect("Mock plant should lock.");

        SensorReadings {
            extruder_rpm: plant.extruder_rpm,
            spool_rpm: plant.spool_rpm,
            temperature_c: plant.temperature_c,
            fan_rpm: plant.fan_rpm,
            break_levels: plant.asserted_break_levels(),
        }
    }
}
