use crate::config::Config;
use crate::constants::SAFE_FAN_DUTY_CYCLE;
use crate::control::actuator::ActuatorChannel;
use crate::control::math_tool::clip;
use crate::control::pid::{Pid, PidGains};
use crate::enums::{ChannelMode, ControlChannelId};

/// State of a single control channel. The mode transitions are centralized
/// in the control loop; this struct enforces the per-channel invariants:
/// the PID state is reset on every transition into the closed-loop control
/// and on the gain edits while armed, and it is held frozen in the
/// open-loop control.
pub struct ControlChannel {
    // Control channel.
    pub id: ControlChannelId,
    // Control mode.
    pub mode: ChannelMode,
    // Target value in the channel-specific unit.
    pub setpoint: f64,
    // Last sampled value in the channel-specific unit.
    pub measured: f64,
    // Operator-supplied output in percent for the open-loop control.
    pub open_loop_value: f64,
    // Last output written to the actuator in percent.
    pub last_output: f64,
    // Setpoint limits: (min, max).
    _setpoint_limits: (f64, f64),
    // Output limits: (min, max).
    _output_limits: (f64, f64),
    // Controller.
    pub pid: Pid,
    // Actuator output path.
    pub actuator: ActuatorChannel,
}

impl ControlChannel {
    /// Create a new control channel.
    ///
    /// # Arguments
    /// * `id` - Control channel.
    /// * `config` - The configuration.
    ///
    /// # Returns
    /// A new control channel.
    pub fn new(id: ControlChannelId, config: &Config) -> Self {
        let output_limits = config.output_limits[&id];

        Self {
            id: id,
            mode: ChannelMode::Disabled,
            setpoint: config.default_setpoints[&id],
            measured: 0.0,
            open_loop_value: output_limits.0,
            last_output: 0.0,
            _setpoint_limits: config.setpoint_limits[&id],
            _output_limits: output_limits,
            pid: Pid::new(config.default_gains[&id], output_limits.0, output_limits.1),
            actuator: ActuatorChannel::new(id),
        }
    }

    /// Get the output limits.
    ///
    /// # Returns
    /// Output limits: (min, max).
    pub fn output_limits(&self) -> (f64, f64) {
        self._output_limits
    }

    /// Set the setpoint.
    ///
    /// # Arguments
    /// * `setpoint` - Target value in the channel-specific unit.
    ///
    /// # Returns
    /// Ok if the setpoint is in the limits. Otherwise, an error message.
    pub fn set_setpoint(&mut self, setpoint: f64) -> Result<(), &'static str> {
        if !setpoint.is_finite()
            || (setpoint < self._setpoint_limits.0)
            || (setpoint > self._setpoint_limits.1)
        {
            return Err("The setpoint is out of the limits.");
        }

        self.setpoint = setpoint;

        Ok(())
    }

    /// Set the gains. An armed channel resets the controller state so a
    /// stale previous error does not produce a derivative spike.
    ///
    /// # Arguments
    /// * `gains` - New gains.
    ///
    /// # Returns
    /// Ok if the gains are valid. Otherwise, an error message.
    pub fn set_gains(&mut self, gains: PidGains) -> Result<(), &'static str> {
        self.pid.set_gains(gains)?;

        if self.mode == ChannelMode::ClosedLoop {
            self.pid.reset();
        }

        Ok(())
    }

    /// Transition into the closed-loop control. The controller state always
    /// starts from zero.
    pub fn enable_closed_loop(&mut self) {
        self.pid.reset();
        self.mode = ChannelMode::ClosedLoop;
    }

    /// Transition into the open-loop control. The controller state is held
    /// frozen, not advanced, while the operator drives the output directly.
    ///
    /// # Arguments
    /// * `value` - Operator-supplied output in percent, clipped to the
    /// output limits.
    pub fn set_open_loop(&mut self, value: f64) {
        self.open_loop_value = clip(value, self._output_limits.0, self._output_limits.1);
        self.mode = ChannelMode::OpenLoop;
    }

    /// Disable the channel.
    pub fn disable(&mut self) {
        self.mode = ChannelMode::Disabled;
    }

    /// Get the safe output of the channel: zero for the motors and the
    /// heater, the idle duty for the fan.
    ///
    /// # Returns
    /// Safe output in percent.
    pub fn safe_output(&self) -> f64 {
        match self.id {
            ControlChannelId::Fan => SAFE_FAN_DUTY_CYCLE,
            _ => 0.0,
        }
    }
}
