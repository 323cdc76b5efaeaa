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

use log::{error, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::config::Config;
use crate::control::calibration::{CalibrationError, CalibrationSession};
use crate::control::channel::ControlChannel;
use crate::control::pid::PidGains;
use crate::enums::{BitEnum, BreakLevel, ChannelMode, ControlChannelId, ErrorCode};
use crate::error_handler::{ErrorHandler, InterlockState};
use crate::event_queue::EventQueue;
use crate::interface::device::{ActuatorDevice, DeviceFault};
use crate::measurement::{MeasurementHandle, MeasurementSample};
use crate::settings::SettingsStore;
use crate::telemetry::event::Event;
use crate::telemetry::telemetry_control_loop::{ChannelTelemetry, TelemetryControlLoop};
use crate::utility::get_system_time_ms;

// Mode transition request held while the interlock is tripped.
enum ModeRequest {
    ClosedLoop(ControlChannelId),
    OpenLoop(ControlChannelId, f64),
    Disable(ControlChannelId),
}

pub struct ControlLoop {
    // Configuration.
    pub config: Config,
    // Control channels.
    _channels: HashMap<ControlChannelId, ControlChannel>,
    // Measurement handoff shared with the camera acquisition path.
    _measurement: Arc<MeasurementHandle>,
    // Actuator device.
    _device: Box<dyn ActuatorDevice + Send>,
    // Sequence number of the last fresh sample.
    _last_sequence: u64,
    // Last sample, fresh or reused.
    _last_sample: Option<MeasurementSample>,
    // Consecutive ticks without a fresh sample.
    _stale_ticks: i32,
    // Calibration session.
    _calibration: CalibrationSession,
    // Interlock state.
    _interlock: InterlockState,
    // Mode transition requests held while the interlock is tripped.
    _pending_requests: Vec<ModeRequest>,
    // Persisted settings store.
    _settings_store: SettingsStore,
    // The active coefficient comes from a calibration or not. The fallback
    // constant is never persisted as a calibrated value.
    _is_coefficient_calibrated: bool,
    // Errors and warnings.
    pub error_handler: ErrorHandler,
    // Events to publish.
    pub event_queue: EventQueue,
    // Telemetry.
    pub telemetry: TelemetryControlLoop,
}

impl ControlLoop {
    /// Create a new control loop.
    ///
    /// # Arguments
    /// * `config` - The configuration.
    /// * `measurement` - Measurement handoff shared with the camera
    /// acquisition path.
    /// * `device` - Actuator device.
    ///
    /// # Returns
    /// A new control loop.
    pub fn new(
        config: &Config,
        measurement: &Arc<MeasurementHandle>,
        device: Box<dyn ActuatorDevice + Send>,
    ) -> Self {
        let mut channels = HashMap::new();
        for id in ControlChannelId::iter() {
            channels.insert(id, ControlChannel::new(id, config));
        }

        let mut control_loop = Self {
            config: config.clone(),

            _channels: channels,

            _measurement: measurement.clone(),
            _device: device,

            _last_sequence: 0,
            _last_sample: None,
            _stale_ticks: 0,

            _calibration: CalibrationSession::new(
                config.calibration_min_samples,
                config.calibration_timeout_ticks,
            ),

            _interlock: InterlockState::new(),
            _pending_requests: Vec::new(),

            _settings_store: SettingsStore::new(Path::new(&config.settings_file)),
            _is_coefficient_calibrated: false,

            error_handler: ErrorHandler::new(config.enabled_faults_mask),
            event_queue: EventQueue::new(),
            telemetry: TelemetryControlLoop::new(),
        };
        control_loop.apply_persisted_settings();

        control_loop
    }

    /// Apply the persisted settings: the last-used gains and the calibration
    /// coefficient. A missing coefficient keeps the fallback constant active
    /// and raises a warning so the operator calibrates the camera.
    fn apply_persisted_settings(&mut self) {
        let settings = self._settings_store.load();

        for id in ControlChannelId::iter() {
            if let Some(gains) = settings.gains.get(id.as_ref()) {
                let channel = self
                    ._channels
                    .get_mut(&id)
                    .expect("Channel should exist.");
                if let Err(reason) = channel.set_gains(*gains) {
                    warn!(
                        "Ignore the persisted gains of the {} channel: {reason}",
                        id.as_ref()
                    );
                }
            }
        }

        match settings.calibration_coefficient {
            Some(coefficient) => {
                match self._measurement.set_calibration_coefficient(coefficient) {
                    Ok(()) => {
                        self._is_coefficient_calibrated = true;
                    }
                    Err(reason) => {
                        warn!("Ignore the persisted calibration coefficient: {reason}");
                    }
                }
            }
            None => (),
        }

        if !self._is_coefficient_calibrated {
            warn!("Camera calibration data not found. Use the fallback coefficient.");

            self.error_handler
                .add_error(ErrorCode::WarnFallbackCoefficient);
            self.event_queue
                .add_event(Event::get_message_fallback_coefficient(
                    self._measurement.calibration_coefficient(),
                ));
        }
    }

    /// Get the channel.
    ///
    /// # Arguments
    /// * `id` - Control channel.
    ///
    /// # Returns
    /// The channel.
    pub fn get_channel(&self, id: ControlChannelId) -> &ControlChannel {
        self._channels.get(&id).expect("Channel should exist.")
    }

    /// The interlock is tripped or not.
    ///
    /// # Returns
    /// True if any break level is latched. Otherwise, false.
    pub fn is_interlock_tripped(&self) -> bool {
        self._interlock.is_tripped()
    }

    /// A calibration is running or not.
    ///
    /// # Returns
    /// True if a calibration session is running. Otherwise, false.
    pub fn is_calibrating(&self) -> bool {
        self._calibration.is_running()
    }

    /// Step the control loop by one tick.
    ///
    /// # Arguments
    /// * `dt` - Elapsed time in seconds since the previous tick.
    pub fn step(&mut self, dt: f64) {
        self.poll_measurement();

        let readings = self._device.read_sensors();

        // Update the measured values from the sensors. The spool channel's
        // measured value is the camera-derived diameter (updated in
        // poll_measurement).
        self._channels
            .get_mut(&ControlChannelId::ExtrusionMotor)
            .expect("Channel should exist.")
            .measured = readings.extruder_rpm;
        self._channels
            .get_mut(&ControlChannelId::Heater)
            .expect("Channel should exist.")
            .measured = readings.temperature_c;
        self._channels
            .get_mut(&ControlChannelId::Fan)
            .expect("Channel should exist.")
            .measured = readings.fan_rpm;

        self.advance_calibration();

        self.run_control(dt);

        self.check_interlock(readings.break_levels);

        self.update_telemetry();
    }

    /// Poll the measurement handoff. A missing or re-read sample counts as
    /// stale; after the configured number of consecutive stale ticks, the
    /// diameter channel is forced to the open-loop control exactly once so
    /// the diameter control never runs on stale camera data.
    fn poll_measurement(&mut self) {
        let latest = self._measurement.latest_sample();
        let is_fresh = latest.map_or(false, |sample| sample.sequence != self._last_sequence);

        if is_fresh {
            let sample = latest.expect("Sample should exist.");

            self._last_sequence = sample.sequence;
            self._last_sample = Some(sample);
            self._stale_ticks = 0;

            self._channels
                .get_mut(&ControlChannelId::SpoolMotor)
                .expect("Channel should exist.")
                .measured = sample.diameter_mm;

            self._calibration.ingest(sample.raw_pixel_width);

            if self
                .error_handler
                .clear_error(ErrorCode::WarnMeasurementStale)
            {
                self.event_queue
                    .add_event(Event::get_message_measurement_stale(false));
            }

            return;
        }

        self._stale_ticks += 1;

        if self._stale_ticks == self.config.max_stale_ticks {
            warn!(
                "No fresh camera sample for {} consecutive ticks.",
                self._stale_ticks
            );

            if self.error_handler.add_error(ErrorCode::WarnMeasurementStale) {
                self.event_queue
                    .add_event(Event::get_message_measurement_stale(true));
            }

            let is_forced = {
                let channel = self
                    ._channels
                    .get_mut(&ControlChannelId::SpoolMotor)
                    .expect("Channel should exist.");
                if channel.mode == ChannelMode::ClosedLoop {
                    // Seed the open-loop value from the last written output
                    // so the handover is bumpless.
                    let fallback = channel.last_output;
                    channel.set_open_loop(fallback);

                    true
                } else {
                    false
                }
            };

            if is_forced {
                self.event_queue.add_event(Event::get_message_channel_mode(
                    ControlChannelId::SpoolMotor,
                    ChannelMode::OpenLoop,
                ));
            }
        }
    }

    /// Advance the running calibration session, if any. On a success, the
    /// new coefficient is swapped into the measurement handle atomically and
    /// persisted; on a failure, the prior coefficient stays active and the
    /// failure is surfaced as an event.
    fn advance_calibration(&mut self) {
        let result = match self._calibration.advance_tick() {
            Some(result) => result,
            None => {
                return;
            }
        };

        match result {
            Ok(record) => match self
                ._measurement
                .set_calibration_coefficient(record.coefficient)
            {
                Ok(()) => {
                    info!(
                        "Calibrated the diameter coefficient: {} mm/pixel.",
                        record.coefficient
                    );

                    self._is_coefficient_calibrated = true;
                    self.error_handler
                        .clear_error(ErrorCode::WarnFallbackCoefficient);

                    self.persist_settings();

                    self.event_queue
                        .add_event(Event::get_message_calibration_success(&record));
                }
                Err(reason) => {
                    warn!("Reject the calibration result: {reason}");

                    self.event_queue
                        .add_event(Event::get_message_calibration_failed(reason));
                }
            },
            Err(calibration_error) => {
                warn!("Calibration failed: {calibration_error}");

                self.event_queue
                    .add_event(Event::get_message_calibration_failed(
                        &calibration_error.to_string(),
                    ));
            }
        }
    }

    /// Run the control of each channel and write the outputs to the
    /// actuators. A device fault forces the affected channel to the disabled
    /// mode; the other channels continue.
    ///
    /// # Arguments
    /// * `dt` - Elapsed time in seconds since the previous tick.
    fn run_control(&mut self, dt: f64) {
        let mut is_any_saturated = false;
        let mut faults: Vec<DeviceFault> = Vec::new();

        for id in ControlChannelId::iter() {
            let channel = self._channels.get_mut(&id).expect("Channel should exist.");

            let output = match channel.mode {
                ChannelMode::Disabled => {
                    continue;
                }
                ChannelMode::OpenLoop => channel.open_loop_value,
                ChannelMode::ClosedLoop => {
                    let control_error = channel.setpoint - channel.measured;
                    match channel.pid.advance(control_error, dt) {
                        Ok(result) => {
                            if result.is_saturated {
                                is_any_saturated = true;
                            }

                            result.output
                        }
                        Err(pid_error) => {
                            // The process guarantees monotonic tick
                            // timestamps, so this is a programming defect.
                            error!(
                                "Skip the {} channel this tick: {pid_error}",
                                id.as_ref()
                            );

                            continue;
                        }
                    }
                }
            };

            match channel.actuator.write(&mut *self._device, output) {
                Ok(_) => {
                    channel.last_output = output;
                }
                Err(fault) => {
                    channel.disable();
                    faults.push(fault);
                }
            }
        }

        for fault in faults {
            error!("{fault}");

            self.error_handler.add_error(ErrorCode::FaultDeviceWrite);
            self.event_queue
                .add_event(Event::get_message_channel_fault(fault.channel, &fault.reason));
            self.event_queue.add_event(Event::get_message_channel_mode(
                fault.channel,
                ChannelMode::Disabled,
            ));
        }

        if is_any_saturated {
            self.error_handler.add_error(ErrorCode::WarnPidSaturation);
        } else {
            self.error_handler.clear_error(ErrorCode::WarnPidSaturation);
        }
    }

    /// Evaluate the break levels reported by the safety sensor chain. A
    /// newly latched level overrides the tick's outputs with the safe values
    /// and moves every channel to the disabled mode.
    ///
    /// # Arguments
    /// * `break_levels` - Asserted break levels as a bitmask.
    fn check_interlock(&mut self, break_levels: u8) {
        let mut is_newly_tripped = false;
        for level in BreakLevel::iter() {
            if (break_levels & level.bit_value()) != 0 && self._interlock.trip(level) {
                is_newly_tripped = true;

                self.error_handler
                    .add_error(ErrorCode::from_break_level(level));
            }
        }

        if is_newly_tripped {
            error!(
                "Interlock tripped: {:?}.",
                self._interlock.latched_levels()
            );

            self.event_queue.add_event(Event::get_message_interlock(
                true,
                &self._interlock.latched_levels(),
            ));

            self.force_safe_outputs();
        }
    }

    /// Force the safe output of every channel and move it to the disabled
    /// mode: zero for the motors and the heater, the idle duty for the fan.
    fn force_safe_outputs(&mut self) {
        for id in ControlChannelId::iter() {
            let channel = self._channels.get_mut(&id).expect("Channel should exist.");

            let safe_output = channel.safe_output();
            if let Err(fault) = channel.actuator.write(&mut *self._device, safe_output) {
                error!("{fault}");
            }
            channel.last_output = safe_output;

            if channel.mode != ChannelMode::Disabled {
                channel.disable();

                self.event_queue.add_event(Event::get_message_channel_mode(
                    id,
                    ChannelMode::Disabled,
                ));
            }
        }
    }

    /// Update the telemetry data.
    fn update_telemetry(&mut self) {
        for id in ControlChannelId::iter() {
            let channel = self._channels.get(&id).expect("Channel should exist.");

            self.telemetry.channels.insert(
                id,
                ChannelTelemetry {
                    mode: channel.mode,
                    setpoint: channel.setpoint,
                    measured: channel.measured,
                    output: channel.last_output,
                },
            );
        }

        if let Some(sample) = &self._last_sample {
            self.telemetry.diameter_mm = sample.diameter_mm;
            self.telemetry.raw_pixel_width = sample.raw_pixel_width;
        }
        self.telemetry.calibration_coefficient = self._measurement.calibration_coefficient();
        self.telemetry.stale_ticks = self._stale_ticks;
        self.telemetry.is_interlock_tripped = self._interlock.is_tripped();
        self.telemetry.timestamp_ms = get_system_time_ms();

        let summary = self.error_handler.summary_faults_status();
        if summary != self.telemetry.summary_faults_status {
            self.event_queue
                .add_event(Event::get_message_summary_faults_status(summary));
        }
        self.telemetry.summary_faults_status = summary;
    }

    /// Set the setpoint of the channel.
    ///
    /// # Arguments
    /// * `id` - Control channel.
    /// * `setpoint` - Target value in the channel-specific unit.
    ///
    /// # Errors
    /// The setpoint is out of the limits.
    pub fn set_setpoint(&mut self, id: ControlChannelId, setpoint: f64) -> Result<(), &'static str> {
        self._channels
            .get_mut(&id)
            .expect("Channel should exist.")
            .set_setpoint(setpoint)
    }

    /// Set the gains of the channel and persist them. An armed channel
    /// resets the controller state.
    ///
    /// # Arguments
    /// * `id` - Control channel.
    /// * `gains` - New gains.
    ///
    /// # Errors
    /// The gains are invalid.
    pub fn set_gains(&mut self, id: ControlChannelId, gains: PidGains) -> Result<(), &'static str> {
        self._channels
            .get_mut(&id)
            .expect("Channel should exist.")
            .set_gains(gains)?;

        self.persist_settings();

        Ok(())
    }

    /// Transition the channel into the closed-loop control. The request is
    /// held pending while the interlock is tripped and applied once the
    /// interlock is acknowledged.
    ///
    /// # Arguments
    /// * `id` - Control channel.
    ///
    /// # Errors
    /// The diameter channel cannot engage while a calibration is running.
    pub fn enable_closed_loop(&mut self, id: ControlChannelId) -> Result<(), &'static str> {
        if self._interlock.is_tripped() {
            info!(
                "Hold the closed-loop request of the {} channel until the interlock is acknowledged.",
                id.as_ref()
            );
            self._pending_requests.push(ModeRequest::ClosedLoop(id));

            return Ok(());
        }

        if id == ControlChannelId::SpoolMotor {
            if self._calibration.is_running() {
                return Err("A calibration is running.");
            }

            // Give the diameter loop a fresh staleness window.
            self._stale_ticks = 0;
        }

        self._channels
            .get_mut(&id)
            .expect("Channel should exist.")
            .enable_closed_loop();

        self.event_queue
            .add_event(Event::get_message_channel_mode(id, ChannelMode::ClosedLoop));

        Ok(())
    }

    /// Transition the channel into the open-loop control with the
    /// operator-supplied output. The request is held pending while the
    /// interlock is tripped.
    ///
    /// # Arguments
    /// * `id` - Control channel.
    /// * `value` - Operator-supplied output in percent.
    pub fn set_open_loop(&mut self, id: ControlChannelId, value: f64) {
        if self._interlock.is_tripped() {
            info!(
                "Hold the open-loop request of the {} channel until the interlock is acknowledged.",
                id.as_ref()
            );
            self._pending_requests.push(ModeRequest::OpenLoop(id, value));

            return;
        }

        self._channels
            .get_mut(&id)
            .expect("Channel should exist.")
            .set_open_loop(value);

        self.event_queue
            .add_event(Event::get_message_channel_mode(id, ChannelMode::OpenLoop));
    }

    /// Disable the channel and write its safe output once. The request is
    /// held pending while the interlock is tripped.
    ///
    /// # Arguments
    /// * `id` - Control channel.
    pub fn disable_channel(&mut self, id: ControlChannelId) {
        if self._interlock.is_tripped() {
            self._pending_requests.push(ModeRequest::Disable(id));

            return;
        }

        {
            let channel = self._channels.get_mut(&id).expect("Channel should exist.");
            channel.disable();

            let safe_output = channel.safe_output();
            if let Err(fault) = channel.actuator.write(&mut *self._device, safe_output) {
                error!("{fault}");
            }
            channel.last_output = safe_output;
        }

        self.event_queue
            .add_event(Event::get_message_channel_mode(id, ChannelMode::Disabled));
    }

    /// Acknowledge the interlock. The latch is cleared and the held mode
    /// transition requests are applied; a still-asserted break level
    /// re-trips on the next tick.
    pub fn acknowledge_interlock(&mut self) {
        info!("Interlock acknowledged.");

        self._interlock.acknowledge();
        for level in BreakLevel::iter() {
            self.error_handler
                .clear_error(ErrorCode::from_break_level(level));
        }

        self.event_queue
            .add_event(Event::get_message_interlock(false, &[]));

        let pending: Vec<ModeRequest> = self._pending_requests.drain(..).collect();
        for request in pending {
            match request {
                ModeRequest::ClosedLoop(id) => {
                    if let Err(reason) = self.enable_closed_loop(id) {
                        warn!(
                            "Drop the held closed-loop request of the {} channel: {reason}",
                            id.as_ref()
                        );
                    }
                }
                ModeRequest::OpenLoop(id, value) => {
                    self.set_open_loop(id, value);
                }
                ModeRequest::Disable(id) => {
                    self.disable_channel(id);
                }
            }
        }
    }

    /// Start a calibration of the diameter coefficient. The rig has to be
    /// stationary (no filament motion) during the sample window; the caller
    /// is responsible for this precondition.
    ///
    /// # Arguments
    /// * `reference_diameter_mm` - Reference diameter in millimeter.
    ///
    /// # Errors
    /// * `CalibrationError::ChannelBusy` - The diameter channel is in the
    /// closed-loop control, or another calibration is running.
    /// * `CalibrationError::InvalidReference` - The reference diameter is
    /// not a positive value.
    pub fn trigger_calibration(
        &mut self,
        reference_diameter_mm: f64,
    ) -> Result<(), CalibrationError> {
        if self.get_channel(ControlChannelId::SpoolMotor).mode == ChannelMode::ClosedLoop {
            return Err(CalibrationError::ChannelBusy);
        }

        self._calibration.start(reference_diameter_mm)?;

        info!("Calibration started against the reference of {reference_diameter_mm} mm.");

        Ok(())
    }

    /// Start the rig with the startup settings: spool motor open loop at
    /// 30 %, fan open loop at 100 %, and the extrusion motor and the heater
    /// in the closed-loop control at the startup setpoints.
    ///
    /// # Errors
    /// A startup setpoint is out of the configured limits.
    pub fn start_sequence(&mut self) -> Result<(), &'static str> {
        info!("Start the rig with the startup settings.");

        self.set_open_loop(ControlChannelId::SpoolMotor, 30.0);
        self.set_open_loop(ControlChannelId::Fan, 100.0);

        self.set_setpoint(ControlChannelId::ExtrusionMotor, 0.6)?;
        self.enable_closed_loop(ControlChannelId::ExtrusionMotor)?;

        self.set_setpoint(ControlChannelId::Heater, 95.0)?;
        self.enable_closed_loop(ControlChannelId::Heater)?;

        Ok(())
    }

    /// Enter the safe state: the safe output of every channel is written
    /// exactly once and every channel is disabled. This is the second phase
    /// of the shutdown, after the tick loop stopped.
    pub fn enter_safe_state(&mut self) {
        info!("Enter the safe state.");

        self.force_safe_outputs();
    }

    /// Persist the last-used gains and the active calibration coefficient.
    /// The fallback constant is never persisted as a calibrated value.
    fn persist_settings(&mut self) {
        let mut settings = self._settings_store.load();

        settings.calibration_coefficient = if self._is_coefficient_calibrated {
            Some(self._measurement.calibration_coefficient())
        } else {
            None
        };

        for id in ControlChannelId::iter() {
            settings.gains.insert(
                String::from(id.as_ref()),
                self.get_channel(id).pid.gains(),
            );
        }

        if let Err(io_error) = self._settings_store.save(&settings) {
            warn!("Failed to persist the settings: {io_error}.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    use crate::mock::mock_plant::{MockPlant, MockPlantDevice};

    const EPSILON: f64 = 1e-7;
    const TICK: f64 = 0.2;

    fn create_control_loop() -> (
        ControlLoop,
        Arc<MeasurementHandle>,
        Arc<Mutex<MockPlant>>,
        TempDir,
    ) {
        let dir = tempdir().unwrap();

        let mut config = Config::new(Path::new("config/parameters_control.yaml"));
        config.settings_file = String::from(
            dir.path()
                .join("settings.json")
                .to_str()
                .expect("Should be a valid path."),
        );

        let measurement = Arc::new(MeasurementHandle::new(0.01));
        let plant = Arc::new(Mutex::new(MockPlant::new(25.0)));
        let device = Box::new(MockPlantDevice::new(&plant));

        (
            ControlLoop::new(&config, &measurement, device),
            measurement,
            plant,
            dir,
        )
    }

    fn heater_duty(plant: &Arc<Mutex<MockPlant>>) -> f64 {
        plant.lock().unwrap().commanded_duty(ControlChannelId::Heater)
    }

    #[test]
    fn test_new() {
        let (control_loop, _measurement, _plant, _dir) = create_control_loop();

        for id in ControlChannelId::iter() {
            assert_eq!(control_loop.get_channel(id).mode, ChannelMode::Disabled);
        }

        // No calibration data on disk raises the fallback warning.
        assert!(control_loop
            .error_handler
            .has_error(ErrorCode::WarnFallbackCoefficient));
        assert!(!control_loop.is_interlock_tripped());
    }

    #[test]
    fn test_step_closed_loop_heater() {
        let (mut control_loop, _measurement, plant, _dir) = create_control_loop();

        control_loop
            .enable_closed_loop(ControlChannelId::Heater)
            .unwrap();

        // Setpoint 95.0 degree C against the ambient 25.0 degree C pins the
        // heater at the maximum duty.
        control_loop.step(TICK);

        assert_relative_eq!(heater_duty(&plant), 100.0, epsilon = 0.5);
        assert_relative_eq!(
            control_loop.get_channel(ControlChannelId::Heater).last_output,
            100.0,
            epsilon = EPSILON
        );
        assert!(control_loop
            .error_handler
            .has_error(ErrorCode::WarnPidSaturation));
    }

    #[test]
    fn test_step_open_loop() {
        let (mut control_loop, _measurement, plant, _dir) = create_control_loop();

        control_loop.set_open_loop(ControlChannelId::SpoolMotor, 30.0);

        control_loop.step(TICK);

        assert_relative_eq!(
            plant
                .lock()
                .unwrap()
                .commanded_duty(ControlChannelId::SpoolMotor),
            30.0,
            epsilon = 0.5
        );
    }

    #[test]
    fn test_step_updates_telemetry() {
        let (mut control_loop, measurement, _plant, _dir) = create_control_loop();

        measurement.publish_raw(35.0);
        control_loop.step(TICK);

        let telemetry = &control_loop.telemetry;

        assert_relative_eq!(telemetry.diameter_mm, 0.35, epsilon = EPSILON);
        assert_relative_eq!(telemetry.raw_pixel_width, 35.0, epsilon = EPSILON);
        assert_eq!(telemetry.stale_ticks, 0);
        assert!(telemetry.timestamp_ms > 0);
    }

    #[test]
    fn test_staleness_forces_open_loop_once() {
        let (mut control_loop, measurement, _plant, _dir) = create_control_loop();

        measurement.publish_raw(35.0);
        control_loop
            .enable_closed_loop(ControlChannelId::SpoolMotor)
            .unwrap();

        // Fresh sample on the first tick.
        control_loop.step(TICK);
        assert_eq!(
            control_loop.get_channel(ControlChannelId::SpoolMotor).mode,
            ChannelMode::ClosedLoop
        );

        let _ = control_loop.event_queue.get_events_and_clear();

        // No fresh samples afterwards.
        for tick in 1..=4 {
            control_loop.step(TICK);

            assert_eq!(control_loop.telemetry.stale_ticks, tick);
            assert_eq!(
                control_loop.get_channel(ControlChannelId::SpoolMotor).mode,
                ChannelMode::ClosedLoop
            );
        }

        control_loop.step(TICK);

        // The mode flips exactly once at the threshold crossing, seeded from
        // the last written output.
        let channel = control_loop.get_channel(ControlChannelId::SpoolMotor);
        assert_eq!(channel.mode, ChannelMode::OpenLoop);
        assert_relative_eq!(channel.open_loop_value, channel.last_output, epsilon = EPSILON);
        assert!(control_loop
            .error_handler
            .has_error(ErrorCode::WarnMeasurementStale));

        let events = control_loop.event_queue.get_events_and_clear();
        let num_stale_events = events
            .iter()
            .filter(|event| event["id"] == "measurementStale")
            .count();
        assert_eq!(num_stale_events, 1);

        // Further stale ticks do not flip again.
        control_loop.step(TICK);

        let events = control_loop.event_queue.get_events_and_clear();
        assert!(events
            .iter()
            .all(|event| event["id"] != "measurementStale"));

        // A fresh sample clears the warning.
        measurement.publish_raw(35.0);
        control_loop.step(TICK);

        assert!(!control_loop
            .error_handler
            .has_error(ErrorCode::WarnMeasurementStale));
    }

    #[test]
    fn test_interlock_forces_safe_outputs() {
        let (mut control_loop, _measurement, plant, _dir) = create_control_loop();

        control_loop
            .enable_closed_loop(ControlChannelId::Heater)
            .unwrap();
        control_loop.set_open_loop(ControlChannelId::Fan, 80.0);

        control_loop.step(TICK);
        assert_relative_eq!(heater_duty(&plant), 100.0, epsilon = 0.5);

        plant.lock().unwrap().assert_break_level(BreakLevel::Level1);

        control_loop.step(TICK);

        // Every channel is disabled and the outputs are at the safe values
        // within the tick.
        for id in ControlChannelId::iter() {
            assert_eq!(control_loop.get_channel(id).mode, ChannelMode::Disabled);
        }
        assert_relative_eq!(heater_duty(&plant), 0.0, epsilon = EPSILON);
        assert_relative_eq!(
            plant.lock().unwrap().commanded_duty(ControlChannelId::Fan),
            crate::constants::SAFE_FAN_DUTY_CYCLE,
            epsilon = 0.5
        );

        assert!(control_loop.is_interlock_tripped());
        assert!(control_loop
            .error_handler
            .has_error(ErrorCode::FaultInterlockLevel1));
        assert!(control_loop.error_handler.has_fault());
    }

    #[test]
    fn test_interlock_holds_pending_requests() {
        let (mut control_loop, _measurement, plant, _dir) = create_control_loop();

        plant.lock().unwrap().assert_break_level(BreakLevel::Level2);
        control_loop.step(TICK);

        assert!(control_loop.is_interlock_tripped());

        // The request is accepted but held pending.
        control_loop
            .enable_closed_loop(ControlChannelId::Heater)
            .unwrap();

        assert_eq!(
            control_loop.get_channel(ControlChannelId::Heater).mode,
            ChannelMode::Disabled
        );

        // Release the underlying signal and acknowledge.
        plant.lock().unwrap().release_break_level(BreakLevel::Level2);
        control_loop.acknowledge_interlock();

        assert!(!control_loop.is_interlock_tripped());
        assert_eq!(
            control_loop.get_channel(ControlChannelId::Heater).mode,
            ChannelMode::ClosedLoop
        );
        assert!(!control_loop
            .error_handler
            .has_error(ErrorCode::FaultInterlockLevel2));
    }

    #[test]
    fn test_interlock_retrips_when_still_asserted() {
        let (mut control_loop, _measurement, plant, _dir) = create_control_loop();

        plant.lock().unwrap().assert_break_level(BreakLevel::Level3);
        control_loop.step(TICK);

        control_loop.acknowledge_interlock();
        assert!(!control_loop.is_interlock_tripped());

        // The signal is still asserted, so the next tick re-trips.
        control_loop.step(TICK);

        assert!(control_loop.is_interlock_tripped());
    }

    #[test]
    fn test_device_fault_disables_channel() {
        let (mut control_loop, _measurement, plant, _dir) = create_control_loop();

        control_loop
            .enable_closed_loop(ControlChannelId::Heater)
            .unwrap();
        control_loop.set_open_loop(ControlChannelId::Fan, 50.0);

        plant.lock().unwrap().is_device_available = false;

        control_loop.step(TICK);

        // Both active channels fault and are disabled; the scheduler keeps
        // ticking.
        assert_eq!(
            control_loop.get_channel(ControlChannelId::Heater).mode,
            ChannelMode::Disabled
        );
        assert_eq!(
            control_loop.get_channel(ControlChannelId::Fan).mode,
            ChannelMode::Disabled
        );
        assert!(control_loop
            .error_handler
            .has_error(ErrorCode::FaultDeviceWrite));
    }

    #[test]
    fn test_trigger_calibration_channel_busy() {
        let (mut control_loop, measurement, _plant, _dir) = create_control_loop();

        measurement.publish_raw(35.0);
        control_loop
            .enable_closed_loop(ControlChannelId::SpoolMotor)
            .unwrap();

        assert_eq!(
            control_loop.trigger_calibration(1.0),
            Err(CalibrationError::ChannelBusy)
        );

        // The diameter channel cannot engage while a calibration is running
        // either.
        control_loop.disable_channel(ControlChannelId::SpoolMotor);
        control_loop.trigger_calibration(1.0).unwrap();

        assert!(control_loop
            .enable_closed_loop(ControlChannelId::SpoolMotor)
            .is_err());
    }

    #[test]
    fn test_calibration_success() {
        let (mut control_loop, measurement, _plant, _dir) = create_control_loop();

        control_loop.trigger_calibration(1.0).unwrap();
        assert!(control_loop.is_calibrating());

        let samples = [127.8, 127.9, 127.86, 127.88, 127.86];
        for sample in samples.iter() {
            measurement.publish_raw(*sample);
            control_loop.step(TICK);
        }

        assert!(!control_loop.is_calibrating());
        assert_relative_eq!(
            measurement.calibration_coefficient(),
            1.0 / 127.86,
            epsilon = EPSILON
        );

        // The coefficient is persisted and the fallback warning cleared.
        assert!(!control_loop
            .error_handler
            .has_error(ErrorCode::WarnFallbackCoefficient));

        let persisted = control_loop._settings_store.load();
        assert_relative_eq!(
            persisted.calibration_coefficient.unwrap(),
            1.0 / 127.86,
            epsilon = EPSILON
        );

        let events = control_loop.event_queue.get_events_and_clear();
        assert!(events
            .iter()
            .any(|event| (event["id"] == "calibrationResult") && (event["status"] == "success")));
    }

    #[test]
    fn test_calibration_insufficient_samples() {
        let (mut control_loop, measurement, _plant, _dir) = create_control_loop();

        let coefficient_before = measurement.calibration_coefficient();

        control_loop.trigger_calibration(1.0).unwrap();

        // No fresh samples arrive; the session times out.
        for _ in 0..control_loop.config.calibration_timeout_ticks {
            control_loop.step(TICK);
        }

        assert!(!control_loop.is_calibrating());

        // The prior coefficient stays active.
        assert_relative_eq!(
            measurement.calibration_coefficient(),
            coefficient_before,
            epsilon = EPSILON
        );

        let events = control_loop.event_queue.get_events_and_clear();
        assert!(events
            .iter()
            .any(|event| (event["id"] == "calibrationResult") && (event["status"] == "fail")));
    }

    #[test]
    fn test_set_gains_persists() {
        let (mut control_loop, _measurement, _plant, _dir) = create_control_loop();

        let gains = PidGains {
            kp: 2.0,
            ki: 0.3,
            kd: 0.1,
        };
        control_loop
            .set_gains(ControlChannelId::Heater, gains)
            .unwrap();

        let persisted = control_loop._settings_store.load();

        assert_eq!(persisted.gains[ControlChannelId::Heater.as_ref()], gains);

        // The uncalibrated fallback coefficient is never persisted.
        assert!(persisted.calibration_coefficient.is_none());
    }

    #[test]
    fn test_start_sequence() {
        let (mut control_loop, _measurement, _plant, _dir) = create_control_loop();

        control_loop.start_sequence().unwrap();

        let spool = control_loop.get_channel(ControlChannelId::SpoolMotor);
        assert_eq!(spool.mode, ChannelMode::OpenLoop);
        assert_relative_eq!(spool.open_loop_value, 30.0, epsilon = EPSILON);

        let fan = control_loop.get_channel(ControlChannelId::Fan);
        assert_eq!(fan.mode, ChannelMode::OpenLoop);
        assert_relative_eq!(fan.open_loop_value, 100.0, epsilon = EPSILON);

        let extrusion = control_loop.get_channel(ControlChannelId::ExtrusionMotor);
        assert_eq!(extrusion.mode, ChannelMode::ClosedLoop);
        assert_relative_eq!(extrusion.setpoint, 0.6, epsilon = EPSILON);

        let heater = control_loop.get_channel(ControlChannelId::Heater);
        assert_eq!(heater.mode, ChannelMode::ClosedLoop);
        assert_relative_eq!(heater.setpoint, 95.0, epsilon = EPSILON);
    }

    #[test]
    fn test_enter_safe_state() {
        let (mut control_loop, _measurement, plant, _dir) = create_control_loop();

        control_loop
            .enable_closed_loop(ControlChannelId::Heater)
            .unwrap();
        control_loop.step(TICK);

        control_loop.enter_safe_state();

        assert_relative_eq!(heater_duty(&plant), 0.0, epsilon = EPSILON);
        for id in ControlChannelId::iter() {
            assert_eq!(control_loop.get_channel(id).mode, ChannelMode::Disabled);
        }
    }
}
