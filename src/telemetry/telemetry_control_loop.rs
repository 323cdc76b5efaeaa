use serde_json::{json, Value};
use std::collections::HashMap;

use strum::IntoEnumIterator;

use crate::enums::{ChannelMode, ControlChannelId};
use crate::telemetry::telemetry_default::TelemetryDefault;

/// Per-channel tuple pushed to the telemetry sink once per tick.
#[derive(Clone, Copy)]
pub struct ChannelTelemetry {
    // Control mode.
    pub mode: ChannelMode,
    // Target value in the channel-specific unit.
    pub setpoint: f64,
    // Last sampled value in the channel-specific unit.
    pub measured: f64,
    // Last output written to the actuator in percent.
    pub output: f64,
}

#[derive(Clone)]
pub struct TelemetryControlLoop {
    // Per-channel telemetry.
    pub channels: HashMap<ControlChannelId, ChannelTelemetry>,
    // Diameter in millimeter.
    pub diameter_mm: f64,
    // Width of the fiber in pixels.
    pub raw_pixel_width: f64,
    // Calibration coefficient in mm/pixel.
    pub calibration_coefficient: f64,
    // Consecutive ticks without a fresh camera sample.
    pub stale_ticks: i32,
    // The interlock is tripped or not.
    pub is_interlock_tripped: bool,
    // Summary of the faults status.
    pub summary_faults_status: u64,
    // Timestamp of the tick in milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
    // Cycle time in second.
    pub cycle_time: f64,
}

impl TelemetryDefault for TelemetryControlLoop {
    fn get_messages(&self, digit: i32) -> Vec<Value> {
        let mut messages = Vec::new();
        for channel in ControlChannelId::iter() {
            messages.push(self.get_message_channel_state(channel, digit));
        }
        messages.push(self.get_message_diameter(digit));
        messages.push(self.get_message_summary_faults_status());
        messages.push(self.get_message_cycle_time(digit));

        messages
    }
}

impl TelemetryControlLoop {
    /// Create a new control-loop telemetry object.
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        for channel in ControlChannelId::iter() {
            channels.insert(
                channel,
                ChannelTelemetry {
                    mode: ChannelMode::Disabled,
                    setpoint: 0.0,
                    measured: 0.0,
                    output: 0.0,
                },
            );
        }

        Self {
            channels: channels,
            diameter_mm: 0.0,
            raw_pixel_width: 0.0,
            calibration_coefficient: 0.0,
            stale_ticks: 0,
            is_interlock_tripped: false,
            summary_faults_status: 0,
            timestamp_ms: 0,
            cycle_time: 0.0,
        }
    }

    /// Get the message of the channel state.
    ///
    /// # Arguments
    /// * `channel` - Control channel.
    /// * `digit` - The number of digits after the decimal point.
    ///
    /// # Returns
    /// The message of the channel state.
    fn get_message_channel_state(&self, channel: ControlChannelId, digit: i32) -> Value {
        let state = &self.channels[&channel];

        json!({
            "id": "channelState",
            "channel": channel.as_ref(),
            "mode": state.mode as u8,
            "setpoint": self.round(state.setpoint, digit),
            "measured": self.round(state.measured, digit),
            "output": self.round(state.output, digit),
            "timestamp": self.timestamp_ms,
        })
    }

    /// Get the message of the diameter measurement.
    ///
    /// # Arguments
    /// * `digit` - The number of digits after the decimal point.
    ///
    /// # Returns
    /// The message of the diameter measurement.
    fn get_message_diameter(&self, digit: i32) -> Value {
        json!({
            "id": "diameter",
            "diameter": self.round(self.diameter_mm, digit),
            "rawPixelWidth": self.round(self.raw_pixel_width, digit),
            "coefficient": self.calibration_coefficient,
            "staleTicks": self.stale_ticks,
            "timestamp": self.timestamp_ms,
        })
    }

    /// Get the message of the summary of the faults status.
    ///
    /// # Returns
    /// The message of the summary of the faults status.
    fn get_message_summary_faults_status(&self) -> Value {
        json!({
            "id": "summaryFaultsStatus",
            "status": self.summary_faults_status,
            "interlockTripped": self.is_interlock_tripped,
            "timestamp": self.timestamp_ms,
        })
    }

    /// Get the message of the cycle time.
    ///
    /// # Arguments
    /// * `digit` - The number of digits after the decimal point.
    ///
    /// # Returns
    /// The message of the cycle time.
    fn get_message_cycle_time(&self, digit: i32) -> Value {
        json!({
            "id": "cycleTime",
            "cycleTime": self.round(self.cycle_time, digit),
            "timestamp": self.timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::constants::NUM_CONTROL_CHANNEL;

    fn create_telemetry() -> TelemetryControlLoop {
        let mut telemetry = TelemetryControlLoop::new();
        telemetry.channels.insert(
            ControlChannelId::Heater,
            ChannelTelemetry {
                mode: ChannelMode::ClosedLoop,
                setpoint: 95.0,
                measured: 25.123456,
                output: 100.0,
            },
        );
        telemetry.diameter_mm = 0.351234;
        telemetry.timestamp_ms = 10;

        telemetry
    }

    #[test]
    fn test_new() {
        let telemetry = TelemetryControlLoop::new();

        assert_eq!(telemetry.channels.len(), NUM_CONTROL_CHANNEL);
        assert_eq!(telemetry.stale_ticks, 0);
    }

    #[test]
    fn test_get_messages() {
        let telemetry = create_telemetry();

        let messages = telemetry.get_messages(4);

        assert_eq!(messages.len(), NUM_CONTROL_CHANNEL + 3);

        // The channel messages come first in the channel order.
        assert_eq!(messages[0]["id"], "channelState");
        assert_eq!(messages[0]["channel"], "extrusion_motor");

        assert_eq!(messages[2]["channel"], "heater");
        assert_eq!(messages[2]["mode"], ChannelMode::ClosedLoop as u8);
        assert_eq!(messages[2]["setpoint"], 95.0);
        assert_eq!(messages[2]["measured"], 25.1235);
        assert_eq!(messages[2]["output"], 100.0);
        assert_eq!(messages[2]["timestamp"], 10);

        assert_eq!(messages[4]["id"], "diameter");
        assert_eq!(messages[4]["diameter"], 0.3512);

        assert_eq!(messages[5]["id"], "summaryFaultsStatus");
        assert_eq!(messages[5]["status"], 0);

        assert_eq!(messages[6]["id"], "cycleTime");
    }
}
