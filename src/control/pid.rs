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

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::control::math_tool::clip;

/// Proportional, integral, and derivative gains. All the gains need to be
/// finite and >= 0.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    /// The gains are valid or not.
    ///
    /// # Returns
    /// True if all the gains are finite and >= 0. Otherwise, false.
    pub fn is_valid(&self) -> bool {
        [self.kp, self.ki, self.kd]
            .iter()
            .all(|gain| gain.is_finite() && (*gain >= 0.0))
    }
}

/// Output of a single controller step.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PidOutput {
    // Output clipped to the output limits.
    pub output: f64,
    // The unclipped output exceeded the output limits or not.
    pub is_saturated: bool,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PidError {
    // The elapsed time is not a positive, finite value. This is a misuse of
    // the controller and a programming defect in the caller.
    InvalidInterval,
}

impl fmt::Display for PidError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PidError::InvalidInterval => {
                write!(f, "The elapsed time should be a positive, finite value.")
            }
        }
    }
}

impl Error for PidError {}

pub struct Pid {
    // Controller gains.
    _gains: PidGains,
    // Output limits: (min, max).
    _output_min: f64,
    _output_max: f64,
    // Accumulated error multiplied by the elapsed time.
    _integral_sum: f64,
    // Error of the previous step.
    _previous_error: f64,
}

impl Pid {
    /// Create a new PID controller.
    ///
    /// # Arguments
    /// * `gains` - Controller gains.
    /// * `output_min` - Minimum of the output.
    /// * `output_max` - Maximum of the output.
    ///
    /// # Returns
    /// A new PID controller.
    ///
    /// # Panics
    /// If the gains are invalid or the output limits are not ordered.
    pub fn new(gains: PidGains, output_min: f64, output_max: f64) -> Self {
        assert!(gains.is_valid(), "The gains should be finite and >= 0.");
        assert!(
            output_min < output_max,
            "The minimum output should be less than the maximum output."
        );

        Self {
            _gains: gains,
            _output_min: output_min,
            _output_max: output_max,
            _integral_sum: 0.0,
            _previous_error: 0.0,
        }
    }

    /// Get the gains.
    ///
    /// # Returns
    /// The gains.
    pub fn gains(&self) -> PidGains {
        self._gains
    }

    /// Update the gains. The caller is responsible for resetting the
    /// controller if it is armed in the closed-loop control.
    ///
    /// # Arguments
    /// * `gains` - New gains.
    ///
    /// # Returns
    /// Ok if the gains are valid. Otherwise, an error message.
    pub fn set_gains(&mut self, gains: PidGains) -> Result<(), &'static str> {
        if !gains.is_valid() {
            return Err("The gains should be finite and >= 0.");
        }

        self._gains = gains;

        Ok(())
    }

    /// Get the accumulated integral sum.
    ///
    /// # Returns
    /// The integral sum.
    pub fn integral_sum(&self) -> f64 {
        self._integral_sum
    }

    /// Reset the internal state. This needs to be called on every transition
    /// into the closed-loop control and on the gain edits while armed to
    /// avoid a derivative spike from a stale previous error.
    pub fn reset(&mut self) {
        self._integral_sum = 0.0;
        self._previous_error = 0.0;
    }

    /// Advance the controller by one step.
    ///
    /// The integral accumulation is skipped entirely while the produced
    /// output would exceed the output limits and the error has the same sign
    /// as the clip direction, so a long saturated stretch does not keep
    /// growing the integral term.
    ///
    /// # Arguments
    /// * `error` - Error (setpoint - measured) in the channel-specific unit.
    /// * `dt` - Elapsed time in seconds since the previous call. Must be > 0.
    ///
    /// # Returns
    /// The clipped output and the saturation flag.
    ///
    /// # Errors
    /// The elapsed time is not a positive, finite value.
    pub fn advance(&mut self, error: f64, dt: f64) -> Result<PidOutput, PidError> {
        if !dt.is_finite() || (dt <= 0.0) {
            return Err(PidError::InvalidInterval);
        }

        let tentative_integral = self._integral_sum + error * dt;

        let proportional = self._gains.kp * error;
        let integral = self._gains.ki * tentative_integral;
        let derivative = self._gains.kd * (error - self._previous_error) / dt;

        let raw = proportional + integral + derivative;
        let output = clip(raw, self._output_min, self._output_max);

        // Only commit the integral accumulation when the output does not
        // saturate in the direction of the error's sign.
        let is_windup = ((raw > self._output_max) && (error > 0.0))
            || ((raw < self._output_min) && (error < 0.0));
        if !is_windup {
            self._integral_sum = tentative_integral;
        }

        self._previous_error = error;

        Ok(PidOutput {
            output: output,
            is_saturated: (raw > self._output_max) || (raw < self._output_min),
        })
    }
}
