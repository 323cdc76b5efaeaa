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

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::utility::get_system_time_ms;

/// Diameter measurement derived from a single camera frame.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct MeasurementSample {
    // Monotonically increasing sequence number. The scheduler uses it to
    // tell a fresh sample from a re-read of the previous one.
    pub sequence: u64,
    // Timestamp in milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
    // Width of the fiber in pixels.
    pub raw_pixel_width: f64,
    // Diameter in millimeter: raw_pixel_width * calibration_coefficient.
    pub diameter_mm: f64,
    // Calibration coefficient in mm/pixel that produced the diameter.
    pub calibration_coefficient: f64,
}

/// Handoff between the camera acquisition path and the control loop. The
/// acquisition path publishes samples into a single slot; the control loop
/// reads the latest sample without blocking. The calibration coefficient is
/// swapped atomically so a reader never observes a half-written value.
pub struct MeasurementHandle {
    // Latest sample.
    _slot: Mutex<Option<MeasurementSample>>,
    // Calibration coefficient in mm/pixel as the f64 bits.
    _coefficient_bits: AtomicU64,
    // Sequence number of the last published sample.
    _sequence: AtomicU64,
}

impl MeasurementHandle {
    /// Create a new measurement handle.
    ///
    /// # Arguments
    /// * `coefficient` - Calibration coefficient in mm/pixel.
    ///
    /// # Returns
    /// A new measurement handle.
    ///
    /// # Panics
    /// If the coefficient is not a positive, finite value.
    pub fn new(coefficient: f64) -> Self {
        assert!(
            coefficient.is_finite() && (coefficient > 0.0),
            "The calibration coefficient should be a positive, finite value."
        );

        Self {
            _slot: Mutex::new(None),
            _coefficient_bits: AtomicU64::new(coefficient.to_bits()),
            _sequence: AtomicU64::new(0),
        }
    }

    /// Get the latest sample. This never blocks on the acquisition path; a
    /// stale read is valid and detected by the caller with the sequence
    /// number.
    ///
    /// # Returns
    /// The latest sample, if any has been published.
    pub fn latest_sample(&self) -> Option<MeasurementSample> {
        *self._slot.lock().expect("Sample slot should lock.")
    }

    /// Publish a raw pixel width as a new sample.
    ///
    /// # Arguments
    /// * `raw_pixel_width` - Width of the fiber in pixels.
    ///
    /// # Returns
    /// The published sample.
    pub fn publish_raw(&self, raw_pixel_width: f64) -> MeasurementSample {
        let coefficient = self.calibration_coefficient();
        let sample = MeasurementSample {
            sequence: self._sequence.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp_ms: get_system_time_ms(),
            raw_pixel_width: raw_pixel_width,
            diameter_mm: raw_pixel_width * coefficient,
            calibration_coefficient: coefficient,
        };

        *self._slot.lock().expect("Sample slot should lock.") = Some(sample);

        sample
    }

    /// Get the calibration coefficient.
    ///
    /// # Returns
    /// Calibration coefficient in mm/pixel.
    pub fn calibration_coefficient(&self) -> f64 {
        f64::from_bits(self._coefficient_bits.load(Ordering::Relaxed))
    }

    /// Set the calibration coefficient.
    ///
    /// # Arguments
    /// * `coefficient` - Calibration coefficient in mm/pixel.
    ///
    /// # Returns
    /// Ok if the coefficient is a positive, finite value. Otherwise, an
    /// error message and the previous coefficient stays active.
    pub fn set_calibration_coefficient(&self, coefficient: f64) -> Result<(), &'static str> {
        if !coefficient.is_finite() || (coefficient <= 0.0) {
            return Err("The calibration coefficient should be a positive, finite value.");
        }

        self._coefficient_bits
            .store(coefficient.to_bits(), Ordering::Relaxed);

        Ok(())
    }
}
