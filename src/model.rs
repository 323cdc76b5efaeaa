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

use log::{error, info};
use serde_json::Value;
use std::path::Path;
use std::sync::{
    atomic::AtomicBool,
    atomic::Ordering,
    mpsc::{sync_channel, Receiver, SyncSender},
    Arc, Mutex,
};
use std::thread::{spawn, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::constants::{BOUND_SYNC_CHANNEL, FALLBACK_DIAMETER_COEFFICIENT};
use crate::control::control_loop_process::ControlLoopProcess;
use crate::interface::telemetry_sink::{CsvTelemetrySink, TelemetrySink};
use crate::measurement::MeasurementHandle;
use crate::mock::mock_camera::MockCamera;
use crate::mock::mock_plant::{MockPlant, MockPlantDevice};
use crate::telemetry::telemetry::Telemetry;
use crate::telemetry::telemetry_default::TelemetryDefault;
use crate::utility::{get_message_name, get_parameter, is_command};

pub struct Model {
    // Is the simulation mode or not.
    _is_simulation_mode: bool,
    // The digit of the telemetry.
    _telemetry_digit: i32,
    // Configuration of the control loop.
    _config: Config,
    // Measurement handoff shared with the camera acquisition path.
    pub measurement: Arc<MeasurementHandle>,
    // Mock plant in the simulation mode.
    _plant: Option<Arc<Mutex<MockPlant>>>,
    // Receiver of the telemetry to the model.
    _receiver_to_model: Receiver<Telemetry>,
    // Sender of the telemetry to the model.
    _sender_to_model: Option<SyncSender<Telemetry>>,
    // Sender of the operator commands to the control loop.
    _sender_to_control_loop: Option<SyncSender<Value>>,
    // Telemetry sinks.
    _sinks: Vec<Box<dyn TelemetrySink + Send>>,
    // An Arc instance that holds the AtomicBool instance to stop the threads.
    pub stop: Arc<AtomicBool>,
    // Handles of the threads.
    _handles: Vec<JoinHandle<()>>,
}

impl Model {
    /// Create a new model.
    ///
    /// # Arguments
    /// * `is_simulation_mode` - Is the simulation mode or not.
    /// * `period_ms` - Tick period in milliseconds to override the
    /// configuration file. If the value is 0, the period is read from the
    /// configuration file.
    /// * `telemetry_file` - Telemetry CSV file. If None, no CSV sink is
    /// attached.
    ///
    /// # Returns
    /// A new model.
    ///
    /// # Panics
    /// If the hardware mode is requested: only the simulation mode has a
    /// device backend at the moment.
    pub fn new(is_simulation_mode: bool, period_ms: u64, telemetry_file: Option<&Path>) -> Self {
        if !is_simulation_mode {
            panic!("The hardware mode is not implemented yet.");
        }

        let config_file = Path::new("config/parameters_app.yaml");
        let stop = Arc::new(AtomicBool::new(false));

        let mut config = Config::new(Path::new("config/parameters_control.yaml"));
        if period_ms != 0 {
            config.control_frequency = 1000.0 / (period_ms as f64);
        }

        let mut sinks: Vec<Box<dyn TelemetrySink + Send>> = Vec::new();
        if let Some(filepath) = telemetry_file {
            match CsvTelemetrySink::new(filepath) {
                Ok(sink) => {
                    info!("Record the telemetry to {:?}.", filepath);
                    sinks.push(Box::new(sink));
                }
                Err(csv_error) => {
                    error!("Failed to create the telemetry file: {csv_error}.");
                }
            }
        }

        let (sender_to_model, receiver_to_model) = sync_channel(BOUND_SYNC_CHANNEL);

        Self {
            _is_simulation_mode: is_simulation_mode,
            _telemetry_digit: get_parameter(config_file, "telemetry_digit"),

            _config: config,

            measurement: Arc::new(MeasurementHandle::new(FALLBACK_DIAMETER_COEFFICIENT)),
            _plant: Some(Arc::new(Mutex::new(MockPlant::new(25.0)))),

            _receiver_to_model: receiver_to_model,
            _sender_to_model: Some(sender_to_model),

            _sender_to_control_loop: None,

            _sinks: sinks,

            stop: stop,

            _handles: Vec::new(),
        }
    }

    /// Run the processes: the control loop and, in the simulation mode, the
    /// camera acquisition.
    pub fn run_processes(&mut self) {
        let sender_to_model = self
            ._sender_to_model
            .as_ref()
            .expect("Sender to the model should exist.");

        let plant = self
            ._plant
            .as_ref()
            .expect("Mock plant should exist in the simulation mode.");

        // Control loop process
        let device = Box::new(MockPlantDevice::new(plant));
        let mut control_loop_process = ControlLoopProcess::new(
            &self._config,
            &self.measurement,
            device,
            sender_to_model,
            &self.stop,
        );
        self._sender_to_control_loop = Some(control_loop_process.get_sender_to_control_loop());

        self._handles.push(spawn(move || {
            control_loop_process.run();
        }));

        // Camera acquisition process
        if self._is_simulation_mode {
            let mut camera = MockCamera::new(
                plant,
                &self.measurement,
                self._config.tick_period_ms(),
                &self.stop,
            );
            self._handles.push(spawn(move || {
                camera.run();
            }));
        }

        // Drop the internal sender to the model. This is to let the
        // self.step() wakes up when all the senders are dropped once we stop
        // the application.
        self._sender_to_model = None;
    }

    /// Queue an operator command. The command is applied at the start of the
    /// next tick boundary, never mid-tick.
    ///
    /// # Arguments
    /// * `message` - Command message.
    ///
    /// # Errors
    /// The message is not a command, the queue is full, or the control loop
    /// is not running.
    pub fn handle_command(&self, message: Value) -> Result<(), &'static str> {
        if !is_command(&get_message_name(&message)) {
            return Err("Not a command message.");
        }

        match &self._sender_to_control_loop {
            Some(sender) => sender
                .try_send(message)
                .map_err(|_| "The command queue is full."),
            None => Err("The control loop is not running."),
        }
    }

    /// Step the model: forward the received telemetry and events to the
    /// sinks.
    pub fn step(&mut self) {
        if let Ok(telemetry) = self
            ._receiver_to_model
            .recv_timeout(Duration::from_millis(100))
        {
            self.process_telemetry(telemetry);
        }
    }

    /// Process the received telemetry.
    ///
    /// # Arguments
    /// * `telemetry` - Telemetry.
    fn process_telemetry(&mut self, telemetry: Telemetry) {
        let mut messages = Vec::new();

        if let Some(control_loop) = telemetry.control_loop {
            messages.extend(control_loop.get_messages(self._telemetry_digit));
        }

        if let Some(command_result) = telemetry.command_result {
            info!("Command result: {command_result}.");
        }

        if let Some(events) = telemetry.events {
            for event in &events {
                info!("Event: {event}.");
            }

            messages.extend(events);
        }

        for sink in self._sinks.iter_mut() {
            sink.push(&messages);
        }
    }

    /// Stop the threads.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);

        for handle in self._handles.drain(..) {
            handle.join().expect("Process handle should join.");
        }
    }
}
