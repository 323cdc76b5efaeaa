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

use crate::control::math_tool::mean;
use crate::utility::get_system_time_ms;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum CalibrationError {
    // The reference diameter is not a positive value.
    InvalidReference,
    // Fewer than the minimum sample count was obtained within the timeout.
    InsufficientSamples,
    // The diameter channel is in the closed-loop control, or another
    // calibration is already running.
    ChannelBusy,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CalibrationError::InvalidReference => {
                write!(f, "The reference diameter should be a positive value.")
            }
            CalibrationError::InsufficientSamples => {
                write!(f, "Not enough samples were obtained within the timeout.")
            }
            CalibrationError::ChannelBusy => {
                write!(f, "The diameter channel is busy.")
            }
        }
    }
}

impl Error for CalibrationError {}

/// Result of a successful calibration. A new calibration creates a new
/// record; a record is never mutated in place.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct CalibrationRecord {
    // Reference diameter in millimeter.
    pub reference_diameter_mm: f64,
    // Mean of the raw pixel widths.
    pub mean_pixel_width: f64,
    // Computed coefficient in mm/pixel.
    pub coefficient: f64,
    // Number of the averaged samples.
    pub num_samples: usize,
    // Timestamp in milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
}

/// Calibration of the diameter coefficient against a reference fiber.
///
/// The procedure averages consecutive raw pixel-width samples to reduce
/// the single-frame noise. It runs as a session driven by the control
/// loop: one fresh sample is ingested per tick, so the loop never blocks
/// on the camera. The rig has to be stationary (no filament motion) during
/// the sample window; the caller is responsible for this precondition.
pub struct CalibrationSession {
    // Minimum number of samples to average.
    _min_samples: usize,
    // Number of ticks before the session times out.
    _timeout_ticks: i32,
    // Reference diameter in millimeter.
    _reference_diameter_mm: f64,
    // Collected raw pixel widths.
    _samples: Vec<f64>,
    // Elapsed ticks since the session started.
    _elapsed_ticks: i32,
    // The session is running or not.
    _is_running: bool,
}

impl CalibrationSession {
    /// Create a new calibration session.
    ///
    /// # Arguments
    /// * `min_samples` - Minimum number of samples to average.
    /// * `timeout_ticks` - Number of ticks before the session times out.
    ///
    /// # Returns
    /// A new calibration session.
    pub fn new(min_samples: usize, timeout_ticks: i32) -> Self {
        Self {
            _min_samples: min_samples,
            _timeout_ticks: timeout_ticks,
            _reference_diameter_mm: 0.0,
            _samples: Vec::new(),
            _elapsed_ticks: 0,
            _is_running: false,
        }
    }

    /// The session is running or not.
    ///
    /// # Returns
    /// True if the session is running. Otherwise, false.
    pub fn is_running(&self) -> bool {
        self._is_running
    }

    /// Start the session.
    ///
    /// # Arguments
    /// * `reference_diameter_mm` - Reference diameter in millimeter.
    ///
    /// # Errors
    /// * `CalibrationError::InvalidReference` - The reference diameter is
    /// not a positive value.
    /// * `CalibrationError::ChannelBusy` - Another session is running.
    pub fn start(&mut self, reference_diameter_mm: f64) -> Result<(), CalibrationError> {
        if self._is_running {
            return Err(CalibrationError::ChannelBusy);
        }

        if !reference_diameter_mm.is_finite() || (reference_diameter_mm <= 0.0) {
            return Err(CalibrationError::InvalidReference);
        }

        self._reference_diameter_mm = reference_diameter_mm;
        self._samples.clear();
        self._elapsed_ticks = 0;
        self._is_running = true;

        Ok(())
    }

    /// Ingest a fresh raw pixel-width sample. Ignored when the session is
    /// not running.
    ///
    /// # Arguments
    /// * `raw_pixel_width` - Width of the fiber in pixels.
    pub fn ingest(&mut self, raw_pixel_width: f64) {
        if self._is_running && raw_pixel_width.is_finite() && (raw_pixel_width > 0.0) {
            self._samples.push(raw_pixel_width);
        }
    }

    /// Advance the session by one tick.
    ///
    /// # Returns
    /// None while the session keeps collecting. Otherwise, the calibration
    /// record, or `CalibrationError::InsufficientSamples` when the timeout
    /// elapsed first. The session stops in both cases and the caller keeps
    /// the prior coefficient active on a failure.
    pub fn advance_tick(&mut self) -> Option<Result<CalibrationRecord, CalibrationError>> {
        if !self._is_running {
            return None;
        }

        self._elapsed_ticks += 1;

        if self._samples.len() >= self._min_samples {
            self._is_running = false;

            return Some(Ok(self.compute_record()));
        }

        if self._elapsed_ticks >= self._timeout_ticks {
            self._is_running = false;

            return Some(Err(CalibrationError::InsufficientSamples));
        }

        None
    }

    /// Abort the session. The internal data will be reset.
    pub fn abort(&mut self) {
        self._is_running = false;
        self._samples.clear();
        self._elapsed_ticks = 0;
    }

    /// Compute the calibration record from the collected samples.
    ///
    /// # Returns
    /// The calibration record.
    fn compute_record(&self) -> CalibrationRecord {
        let mean_pixel_width = mean(&self._samples);

        CalibrationRecord {
            reference_diameter_mm: self._reference_diameter_mm,
            mean_pixel_width: mean_pixel_width,
            coefficient: self._reference_diameter_mm / mean_pixel_width,
            num_samples: self._samples.len(),
            timestamp_ms: get_system_time_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const EPSILON: f64 = 1e-7;

    fn create_calibration_session() -> CalibrationSession {
        CalibrationSession::new(5, 25)
    }

    #[test]
    fn test_start() {
        let mut session = create_calibration_session();

        assert!(session.start(1.0).is_ok());
        assert!(session.is_running());

        // A second start while running is busy.
        assert_eq!(session.start(1.0), Err(CalibrationError::ChannelBusy));
    }

    #[test]
    fn test_start_invalid_reference() {
        let mut session = create_calibration_session();

        assert_eq!(session.start(0.0), Err(CalibrationError::InvalidReference));
        assert_eq!(session.start(-1.0), Err(CalibrationError::InvalidReference));
        assert_eq!(
            session.start(f64::NAN),
            Err(CalibrationError::InvalidReference)
        );

        assert!(!session.is_running());
    }

    #[test]
    fn test_advance_tick_success() {
        let mut session = create_calibration_session();
        session.start(1.0).unwrap();

        let samples = [127.8, 127.9, 127.86, 127.88, 127.86];
        let mut record = None;
        for sample in samples.iter() {
            assert!(record.is_none());

            session.ingest(*sample);
            record = session.advance_tick();
        }

        let record = record.unwrap().unwrap();

        assert_relative_eq!(record.reference_diameter_mm, 1.0, epsilon = EPSILON);
        assert_relative_eq!(record.mean_pixel_width, 127.86, epsilon = EPSILON);
        assert_relative_eq!(record.coefficient, 1.0 / 127.86, epsilon = EPSILON);
        assert_eq!(record.num_samples, 5);
        assert!(record.timestamp_ms > 0);

        assert!(!session.is_running());
    }

    #[test]
    fn test_advance_tick_insufficient_samples() {
        let mut session = CalibrationSession::new(5, 10);
        session.start(1.0).unwrap();

        // Only three fresh samples arrive before the timeout.
        for idx in 0..10 {
            if idx < 3 {
                session.ingest(127.86);
            }

            let result = session.advance_tick();
            if idx < 9 {
                assert!(result.is_none());
            } else {
                assert_eq!(
                    result.unwrap(),
                    Err(CalibrationError::InsufficientSamples)
                );
            }
        }

        assert!(!session.is_running());
    }

    #[test]
    fn test_ingest() {
        let mut session = create_calibration_session();

        // Ignored when the session is not running.
        session.ingest(127.86);

        session.start(1.0).unwrap();

        // Invalid samples are ignored.
        session.ingest(0.0);
        session.ingest(-1.0);
        session.ingest(f64::NAN);

        for _ in 0..5 {
            session.ingest(127.86);
        }

        let record = session.advance_tick().unwrap().unwrap();

        assert_eq!(record.num_samples, 5);
    }

    #[test]
    fn test_abort() {
        let mut session = create_calibration_session();
        session.start(1.0).unwrap();

        session.abort();

        assert!(!session.is_running());
        assert!(session.advance_tick().is_none());

        // A new session can start after the abort.
        assert!(session.start(0.5).is_ok());
    }
}
