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

use log::error;
use serde_json::Value;

use crate::command::command_schema::Command;
use crate::control::control_loop::ControlLoop;
use crate::control::pid::PidGains;
use crate::enums::ControlChannelId;

/// Get the control channel from the message.
///
/// # Arguments
/// * `message` - The message that should have the "channel" field.
///
/// # Returns
/// The control channel.
fn get_channel(message: &Value) -> Option<ControlChannelId> {
    ControlChannelId::from_repr(message["channel"].as_u64()? as u8)
}

/// Command to set the setpoint of a channel.
pub struct CommandSetSetpoint;
impl Command for CommandSetSetpoint {
    fn name(&self) -> &str {
        "cmd_setSetpoint"
    }

    fn execute(&self, message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let channel = get_channel(message)?;
        let value = message["value"].as_f64()?;

        let control = control_loop?;
        match control.set_setpoint(channel, value) {
            Ok(_) => Some(()),
            Err(reason) => {
                error!("Failed to set the setpoint: {reason}");

                None
            }
        }
    }
}

/// Command to set the controller gains of a channel.
pub struct CommandSetGains;
impl Command for CommandSetGains {
    fn name(&self) -> &str {
        "cmd_setGains"
    }

    fn execute(&self, message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let channel = get_channel(message)?;
        let gains = PidGains {
            kp: message["kp"].as_f64()?,
            ki: message["ki"].as_f64()?,
            kd: message["kd"].as_f64()?,
        };

        let control = control_loop?;
        match control.set_gains(channel, gains) {
            Ok(_) => Some(()),
            Err(reason) => {
                error!("Failed to set the gains: {reason}");

                None
            }
        }
    }
}

/// Command to transition a channel into the closed-loop control.
pub struct CommandEnableClosedLoop;
impl Command for CommandEnableClosedLoop {
    fn name(&self) -> &str {
        "cmd_enableClosedLoop"
    }

    fn execute(&self, message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let channel = get_channel(message)?;

        let control = control_loop?;
        match control.enable_closed_loop(channel) {
            Ok(_) => Some(()),
            Err(reason) => {
                error!("Failed to enable the closed-loop control: {reason}");

                None
            }
        }
    }
}

/// Command to transition a channel into the open-loop control with the
/// operator-supplied output.
pub struct CommandSetOpenLoop;
impl Command for CommandSetOpenLoop {
    fn name(&self) -> &str {
        "cmd_setOpenLoop"
    }

    fn execute(&self, message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let channel = get_channel(message)?;
        let value = message["value"].as_f64()?;

        let control = control_loop?;
        control.set_open_loop(channel, value);

        Some(())
    }
}

/// Command to disable a channel.
pub struct CommandDisableChannel;
impl Command for CommandDisableChannel {
    fn name(&self) -> &str {
        "cmd_disableChannel"
    }

    fn execute(&self, message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let channel = get_channel(message)?;

        let control = control_loop?;
        control.disable_channel(channel);

        Some(())
    }
}

/// Command to start a calibration of the diameter coefficient.
pub struct CommandTriggerCalibration;
impl Command for CommandTriggerCalibration {
    fn name(&self) -> &str {
        "cmd_triggerCalibration"
    }

    fn execute(&self, message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let reference_diameter_mm = message["referenceDiameter"].as_f64()?;

        let control = control_loop?;
        match control.trigger_calibration(reference_diameter_mm) {
            Ok(_) => Some(()),
            Err(calibration_error) => {
                error!("Failed to trigger the calibration: {calibration_error}");

                None
            }
        }
    }
}

/// Command to acknowledge the interlock.
pub struct CommandAcknowledgeInterlock;
impl Command for CommandAcknowledgeInterlock {
    fn name(&self) -> &str {
        "cmd_acknowledgeInterlock"
    }

    fn execute(&self, _message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let control = control_loop?;
        control.acknowledge_interlock();

        Some(())
    }
}

/// Command to start the rig with the startup settings.
pub struct CommandStartSequence;
impl Command for CommandStartSequence {
    fn name(&self) -> &str {
        "cmd_startSequence"
    }

    fn execute(&self, _message: &Value, control_loop: Option<&mut ControlLoop>) -> Option<()> {
        let control = control_loop?;
        match control.start_sequence() {
            Ok(_) => Some(()),
            Err(reason) => {
                error!("Failed to run the start sequence: {reason}");

                None
            }
        }
    }
}
