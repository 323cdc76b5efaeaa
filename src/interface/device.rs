use std::error::Error;
use std::fmt;

use crate::enums::ControlChannelId;

/// Fault reported by the actuator device. The scheduler forces the affected
/// channel to the disabled mode; the other channels continue.
#[derive(Clone, PartialEq, Debug)]
pub struct DeviceFault {
    // Affected channel.
    pub channel: ControlChannelId,
    // Reason of the fault.
    pub reason: String,
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Device fault on the {} channel: {}",
            self.channel.as_ref(),
            self.reason
        )
    }
}

impl Error for DeviceFault {}

/// Sensor readings polled from the rig once per tick.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct SensorReadings {
    // Extrusion motor speed in RPM.
    pub extruder_rpm: f64,
    // Spooling motor speed in RPM.
    pub spool_rpm: f64,
    // Heater temperature in degree Celsius.
    pub temperature_c: f64,
    // Fan speed in RPM.
    pub fan_rpm: f64,
    // Asserted break levels as a bitmask. See the `BreakLevel` enum for the
    // bit positions.
    pub break_levels: u8,
}

pub trait ActuatorDevice {
    /// Write the PWM counts to the channel.
    ///
    /// # Arguments
    /// * `channel` - Control channel.
    /// * `counts` - PWM counts. The caller is responsible for the clipping
    /// to the output limits; this is a pass-through.
    ///
    /// # Errors
    /// The device is unavailable. The failure is reported, not retried.
    fn write(&mut self, channel: ControlChannelId, counts: u16) -> Result<(), DeviceFault>;

    /// Read the sensors.
    ///
    /// # Returns
    /// The sensor readings.
    fn read_sensors(&mut self) -> SensorReadings;
}
