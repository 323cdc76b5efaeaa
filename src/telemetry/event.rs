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

use serde_json::{json, Value};

use crate::control::calibration::CalibrationRecord;
use crate::enums::{BitEnum, BreakLevel, ChannelMode, ControlChannelId};

pub struct Event;
impl Event {
    /// Get the message of the channel mode.
    ///
    /// # Arguments
    /// * `channel` - Control channel.
    /// * `mode` - Control mode.
    ///
    /// # Returns
    /// The message of the channel mode.
    pub fn get_message_channel_mode(channel: ControlChannelId, mode: ChannelMode) -> Value {
        json!({
            "id": "channelMode",
            "channel": channel.as_ref(),
            "mode": mode as u8,
        })
    }

    /// Get the message that the interlock is tripped or not.
    ///
    /// # Arguments
    /// * `is_tripped` - Interlock is tripped or not.
    /// * `levels` - Latched break levels.
    ///
    /// # Returns
    /// The message that the interlock is tripped or not.
    pub fn get_message_interlock(is_tripped: bool, levels: &[BreakLevel]) -> Value {
        let latched: Vec<u8> = levels.iter().map(|level| level.bit_value()).collect();

        json!({
            "id": "interlock",
            "tripped": is_tripped,
            "levels": latched,
        })
    }

    /// Get the message that the camera measurement is stale or not.
    ///
    /// # Arguments
    /// * `is_stale` - Measurement is stale or not.
    ///
    /// # Returns
    /// The message that the camera measurement is stale or not.
    pub fn get_message_measurement_stale(is_stale: bool) -> Value {
        json!({
            "id": "measurementStale",
            "isStale": is_stale,
        })
    }

    /// Get the message of a successful calibration.
    ///
    /// # Arguments
    /// * `record` - Calibration record.
    ///
    /// # Returns
    /// The message of a successful calibration.
    pub fn get_message_calibration_success(record: &CalibrationRecord) -> Value {
        json!({
            "id": "calibrationResult",
            "status": "success",
            "referenceDiameter": record.reference_diameter_mm,
            "meanPixelWidth": record.mean_pixel_width,
            "coefficient": record.coefficient,
            "numSamples": record.num_samples,
        })
    }

    /// Get the message of a failed calibration.
    ///
    /// # Arguments
    /// * `reason` - Reason of the failure.
    ///
    /// # Returns
    /// The message of a failed calibration.
    pub fn get_message_calibration_failed(reason: &str) -> Value {
        json!({
            "id": "calibrationResult",
            "status": "fail",
            "reason": reason,
        })
    }

    /// Get the message of the summary of the faults status.
    ///
    /// # Arguments
    /// * `status` - Summary of the faults status.
    ///
    /// # Returns
    /// The message of the summary of the faults status.
    pub fn get_message_summary_faults_status(status: u64) -> Value {
        json!({
            "id": "summaryFaultsStatus",
            "status": status,
        })
    }

    /// Get the message that the fallback coefficient is in use.
    ///
    /// # Arguments
    /// * `coefficient` - Fallback coefficient in mm/pixel.
    ///
    /// # Returns
    /// The message that the fallback coefficient is in use.
    pub fn get_message_fallback_coefficient(coefficient: f64) -> Value {
        json!({
            "id": "fallbackCoefficient",
            "coefficient": coefficient,
        })
    }

    /// Get the message of a channel fault.
    ///
    /// # Arguments
    /// * `channel` - Control channel.
    /// * `reason` - Reason of the fault.
    ///
    /// # Returns
    /// The message of a channel fault.
    pub fn get_message_channel_fault(channel: ControlChannelId, reason: &str) -> Value {
        json!({
            "id": "channelFault",
            "channel": channel.as_ref(),
            "reason": reason,
        })
    }
}
