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

use crate::constants::PWM_FULL_SCALE;
use crate::control::math_tool::clip;
use crate::enums::ControlChannelId;
use crate::interface::device::{ActuatorDevice, DeviceFault};

/// Typed output path of a single channel. The caller clips the command to
/// the channel's output limits; the only remaining responsibility here is
/// the unit translation from the duty-cycle percentage to the rig's PWM
/// counter scale.
pub struct ActuatorChannel {
    // Control channel.
    pub channel: ControlChannelId,
    // Gain from the duty-cycle percentage to the PWM counts.
    pub gain_percent_to_counts: f64,
    // Last commanded PWM counts.
    _last_counts: u16,
}

impl ActuatorChannel {
    /// Create a new actuator channel.
    ///
    /// # Arguments
    /// * `channel` - Control channel.
    ///
    /// # Returns
    /// A new actuator channel.
    pub fn new(channel: ControlChannelId) -> Self {
        Self {
            channel: channel,
            gain_percent_to_counts: PWM_FULL_SCALE / 100.0,
            _last_counts: 0,
        }
    }

    /// Convert the duty-cycle percentage to the PWM counts.
    ///
    /// # Arguments
    /// * `percent` - Duty cycle in percent.
    ///
    /// # Returns
    /// The corresponding PWM counts.
    pub fn percent_to_counts(&self, percent: f64) -> u16 {
        (clip(percent, 0.0, 100.0) * self.gain_percent_to_counts).round() as u16
    }

    /// Write the command to the device.
    ///
    /// # Arguments
    /// * `device` - Actuator device.
    /// * `percent` - Duty cycle in percent, pre-clipped by the caller.
    ///
    /// # Returns
    /// The written PWM counts.
    ///
    /// # Errors
    /// The device is unavailable. The failure is reported, not retried.
    pub fn write(
        &mut self,
        device: &mut dyn ActuatorDevice,
        percent: f64,
    ) -> Result<u16, DeviceFault> {
        let counts = self.percent_to_counts(percent);
        device.write(self.channel, counts)?;

        self._last_counts = counts;

        Ok(counts)
    }

    /// Get the last commanded PWM counts.
    ///
    /// # Returns
    /// The last commanded PWM counts.
    pub fn last_counts(&self) -> u16 {
        self._last_counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::interface::device::SensorReadings;

    struct DeviceTest {
        is_available: bool,
        last_write: Option<(ControlChannelId, u16)>,
    }

    impl ActuatorDevice for DeviceTest {
        fn write(&mut self, channel: ControlChannelId, counts: u16) -> Result<(), DeviceFault> {
            if !self.is_available {
                return Err(DeviceFault {
                    channel: channel,
                    reason: String::from("The device is unavailable."),
                });
            }

            self.last_write = Some((channel, counts));

            Ok(())
        }

        fn read_sensors(&mut self) -> SensorReadings {
            SensorReadings::default()
        }
    }

    fn create_actuator_channel() -> ActuatorChannel {
        ActuatorChannel::new(ControlChannelId::Heater)
    }

    #[test]
    fn test_percent_to_counts() {
        let actuator = create_actuator_channel();

        assert_eq!(actuator.percent_to_counts(0.0), 0);
        assert_eq!(actuator.percent_to_counts(100.0), 255);
        assert_eq!(actuator.percent_to_counts(50.0), 128);
        assert_eq!(actuator.percent_to_counts(30.0), 77);

        // Out-of-range commands are clipped defensively.
        assert_eq!(actuator.percent_to_counts(-10.0), 0);
        assert_eq!(actuator.percent_to_counts(150.0), 255);
    }

    #[test]
    fn test_write() {
        let mut actuator = create_actuator_channel();
        let mut device = DeviceTest {
            is_available: true,
            last_write: None,
        };

        let counts = actuator.write(&mut device, 50.0).unwrap();

        assert_eq!(counts, 128);
        assert_eq!(actuator.last_counts(), 128);
        assert_eq!(device.last_write, Some((ControlChannelId::Heater, 128)));
    }

    #[test]
    fn test_write_fault() {
        let mut actuator = create_actuator_channel();
        let mut device = DeviceTest {
            is_available: false,
            last_write: None,
        };

        let result = actuator.write(&mut device, 50.0);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().channel, ControlChannelId::Heater);

        // The last commanded counts are untouched on a failure.
        assert_eq!(actuator.last_counts(), 0);
    }
}
