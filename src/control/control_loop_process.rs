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
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{sync_channel, Receiver, SyncSender},
    Arc,
};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::command::{
    command_control_loop::{
        CommandAcknowledgeInterlock, CommandDisableChannel, CommandEnableClosedLoop,
        CommandSetGains, CommandSetOpenLoop, CommandSetSetpoint, CommandStartSequence,
        CommandTriggerCalibration,
    },
    command_schema::CommandSchema,
};
use crate::config::Config;
use crate::constants::BOUND_SYNC_CHANNEL;
use crate::control::control_loop::ControlLoop;
use crate::interface::device::ActuatorDevice;
use crate::measurement::MeasurementHandle;
use crate::telemetry::telemetry::Telemetry;

pub struct ControlLoopProcess {
    // Control loop
    pub control_loop: ControlLoop,
    // Command schema
    _command_schema: CommandSchema,
    // Sender of the telemetry to the model.
    _sender_to_model: SyncSender<Telemetry>,
    // Sender of the message to the control loop.
    _sender_to_control_loop: SyncSender<Value>,
    // Receiver of the message to the control loop.
    _receiver_to_control_loop: Receiver<Value>,
    // Stop the loop.
    _stop: Arc<AtomicBool>,
}

impl ControlLoopProcess {
    /// Create a new instance of the control loop process.
    ///
    /// # Arguments
    /// * `config` - The configuration.
    /// * `measurement` - Measurement handoff shared with the camera
    /// acquisition path.
    /// * `device` - Actuator device.
    /// * `sender_to_model` - The sender to the model.
    /// * `stop` - An Arc instance that holds the AtomicBool instance to stop
    /// the loop.
    ///
    /// # Returns
    /// New instance of the control loop process.
    pub fn new(
        config: &Config,
        measurement: &Arc<MeasurementHandle>,
        device: Box<dyn ActuatorDevice + Send>,
        sender_to_model: &SyncSender<Telemetry>,
        stop: &Arc<AtomicBool>,
    ) -> Self {
        // Sender and receiver to the control loop
        let (sender_to_control_loop, receiver_to_control_loop) = sync_channel(BOUND_SYNC_CHANNEL);

        Self {
            control_loop: ControlLoop::new(config, measurement, device),

            _command_schema: Self::create_command_schema(),

            _sender_to_model: sender_to_model.clone(),

            _sender_to_control_loop: sender_to_control_loop,
            _receiver_to_control_loop: receiver_to_control_loop,

            _stop: stop.clone(),
        }
    }

    /// Create the command schema.
    ///
    /// # Returns
    /// Command schema.
    fn create_command_schema() -> CommandSchema {
        let mut command_schema = CommandSchema::new();
        command_schema.add_command(Box::new(CommandSetSetpoint));
        command_schema.add_command(Box::new(CommandSetGains));
        command_schema.add_command(Box::new(CommandEnableClosedLoop));
        command_schema.add_command(Box::new(CommandSetOpenLoop));
        command_schema.add_command(Box::new(CommandDisableChannel));
        command_schema.add_command(Box::new(CommandTriggerCalibration));
        command_schema.add_command(Box::new(CommandAcknowledgeInterlock));
        command_schema.add_command(Box::new(CommandStartSequence));

        command_schema
    }

    /// Get the sender to the control loop.
    ///
    /// # Returns
    /// The sender to the control loop.
    pub fn get_sender_to_control_loop(&self) -> SyncSender<Value> {
        self._sender_to_control_loop.clone()
    }

    /// Run the control loop. On the way out, the safe output of every
    /// channel is written exactly once before the actuator ownership is
    /// released.
    pub fn run(&mut self) {
        info!("Control loop is running.");

        let period = self.control_loop.config.tick_period_ms();
        let mut last_tick: Option<Instant> = None;
        while !self._stop.load(Ordering::Relaxed) {
            // Time the control loop
            let now = Instant::now();
            let dt = match last_tick {
                Some(tick) => now.duration_since(tick).as_secs_f64(),
                None => (period as f64) / 1000.0,
            };
            last_tick = Some(now);

            // Apply the queued operator command at the tick boundary, never
            // mid-tick.
            let mut command_result = None;
            if let Ok(message) = self._receiver_to_control_loop.try_recv() {
                command_result = Some(
                    self._command_schema
                        .execute(&message, Some(&mut self.control_loop)),
                );
            }

            // Run the control loop
            self.control_loop.step(dt);

            // Send the telemetry and event data to the model and ignore the
            // error: the telemetry sink never blocks the scheduler and drops
            // on backpressure.
            let mut telemetry = self.control_loop.telemetry.clone();

            let events = if self.control_loop.event_queue.has_event() {
                Some(self.control_loop.event_queue.get_events_and_clear())
            } else {
                None
            };

            let cycle_time = now.elapsed().as_millis() as u64;
            telemetry.cycle_time = (cycle_time as f64) / 1000.0;

            let _ = self._sender_to_model.try_send(Telemetry::new(
                Some(telemetry),
                command_result,
                events,
            ));

            // Sleep with the remaining time
            if period > cycle_time {
                sleep(Duration::from_millis(period - cycle_time));
            }
        }

        // Two-phase shutdown: the tick loop stopped accepting new ticks
        // above; now force the safe outputs once.
        self.control_loop.enter_safe_state();

        info!("Control loop is stopped.");
    }
}
