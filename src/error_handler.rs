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

use log::{error, warn};
use strum::IntoEnumIterator;

use crate::enums::{BitEnum, BreakLevel, ErrorCode};

pub struct ErrorHandler {
    // Summary of the faults status as a bitmask of the error codes.
    _summary_faults_status: u64,
    // Enabled faults mask. A raised error code outside the mask is ignored.
    _enabled_faults_mask: u64,
}

impl ErrorHandler {
    /// Create a new error handler.
    ///
    /// # Arguments
    /// * `enabled_faults_mask` - Enabled faults mask.
    ///
    /// # Returns
    /// A new error handler.
    pub fn new(enabled_faults_mask: u64) -> Self {
        Self {
            _summary_faults_status: 0,
            _enabled_faults_mask: enabled_faults_mask,
        }
    }

    /// Add an error code.
    ///
    /// # Arguments
    /// * `error_code` - Error code.
    ///
    /// # Returns
    /// True if the summary of the faults status changed. Otherwise, false.
    pub fn add_error(&mut self, error_code: ErrorCode) -> bool {
        let bit = error_code.bit_value() & self._enabled_faults_mask;
        if bit == 0 {
            return false;
        }

        let is_new = (self._summary_faults_status & bit) == 0;
        if is_new {
            self._summary_faults_status |= bit;

            if error_code.is_fault() {
                error!("Fault raised: {:?}.", error_code);
            } else {
                warn!("Warning raised: {:?}.", error_code);
            }
        }

        is_new
    }

    /// Check if the error code is raised.
    ///
    /// # Arguments
    /// * `error_code` - Error code.
    ///
    /// # Returns
    /// True if the error code is raised. Otherwise, false.
    pub fn has_error(&self, error_code: ErrorCode) -> bool {
        (self._summary_faults_status & error_code.bit_value()) != 0
    }

    /// Clear the error code.
    ///
    /// # Arguments
    /// * `error_code` - Error code.
    ///
    /// # Returns
    /// True if the summary of the faults status changed. Otherwise, false.
    pub fn clear_error(&mut self, error_code: ErrorCode) -> bool {
        let had_error = self.has_error(error_code);
        self._summary_faults_status &= !error_code.bit_value();

        had_error
    }

    /// Check if any fault is raised. The warnings do not count.
    ///
    /// # Returns
    /// True if any fault is raised. Otherwise, false.
    pub fn has_fault(&self) -> bool {
        ErrorCode::iter()
            .any(|error_code| error_code.is_fault() && self.has_error(error_code))
    }

    /// Get the summary of the faults status.
    ///
    /// # Returns
    /// Summary of the faults status.
    pub fn summary_faults_status(&self) -> u64 {
        self._summary_faults_status
    }

    /// Clear all the errors.
    pub fn clear(&mut self) {
        self._summary_faults_status = 0;
    }
}

/// Latched break levels of the safety interlock. Trips come from the rig's
/// safety sensor chain; the latch is cleared only by the operator's
/// acknowledgment. A still-asserted signal re-trips on the next tick.
pub struct InterlockState {
    // Latched break levels as a bitmask.
    _latched: u8,
}

impl InterlockState {
    /// Create a new interlock state.
    ///
    /// # Returns
    /// A new interlock state.
    pub fn new() -> Self {
        Self { _latched: 0 }
    }

    /// Trip the break level.
    ///
    /// # Arguments
    /// * `level` - Break level.
    ///
    /// # Returns
    /// True if the break level is newly latched. Otherwise, false.
    pub fn trip(&mut self, level: BreakLevel) -> bool {
        let is_new = (self._latched & level.bit_value()) == 0;
        self._latched |= level.bit_value();

        is_new
    }

    /// Check if any break level is tripped.
    ///
    /// # Returns
    /// True if any break level is tripped. Otherwise, false.
    pub fn is_tripped(&self) -> bool {
        self._latched != 0
    }

    /// Get the latched break levels.
    ///
    /// # Returns
    /// Latched break levels. The order is from low to high.
    pub fn latched_levels(&self) -> Vec<BreakLevel> {
        BreakLevel::iter()
            .filter(|level| (self._latched & level.bit_value()) != 0)
            .collect()
    }

    /// Acknowledge the interlock and clear the latch.
    pub fn acknowledge(&mut self) {
        self._latched = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_error_handler() -> ErrorHandler {
        ErrorHandler::new(u64::MAX)
    }

    #[test]
    fn test_add_error() {
        let mut error_handler = create_error_handler();

        assert!(error_handler.add_error(ErrorCode::WarnMeasurementStale));
        assert!(error_handler.has_error(ErrorCode::WarnMeasurementStale));

        // Adding the same error again does not change the summary.
        assert!(!error_handler.add_error(ErrorCode::WarnMeasurementStale));
    }

    #[test]
    fn test_add_error_masked() {
        let mut error_handler = ErrorHandler::new(0);

        assert!(!error_handler.add_error(ErrorCode::FaultDeviceWrite));
        assert!(!error_handler.has_error(ErrorCode::FaultDeviceWrite));
        assert_eq!(error_handler.summary_faults_status(), 0);
    }

    #[test]
    fn test_clear_error() {
        let mut error_handler = create_error_handler();

        error_handler.add_error(ErrorCode::FaultDeviceWrite);

        assert!(error_handler.clear_error(ErrorCode::FaultDeviceWrite));
        assert!(!error_handler.has_error(ErrorCode::FaultDeviceWrite));

        assert!(!error_handler.clear_error(ErrorCode::FaultDeviceWrite));
    }

    #[test]
    fn test_has_fault() {
        let mut error_handler = create_error_handler();

        assert!(!error_handler.has_fault());

        // A warning is not a fault.
        error_handler.add_error(ErrorCode::WarnPidSaturation);

        assert!(!error_handler.has_fault());

        error_handler.add_error(ErrorCode::FaultInterlockLevel1);

        assert!(error_handler.has_fault());
    }

    #[test]
    fn test_clear() {
        let mut error_handler = create_error_handler();

        error_handler.add_error(ErrorCode::WarnPidSaturation);
        error_handler.add_error(ErrorCode::FaultDeviceWrite);

        error_handler.clear();

        assert_eq!(error_handler.summary_faults_status(), 0);
        assert!(!error_handler.has_fault());
    }

    #[test]
    fn test_interlock_trip() {
        let mut interlock = InterlockState::new();

        assert!(!interlock.is_tripped());

        assert!(interlock.trip(BreakLevel::Level2));
        assert!(interlock.is_tripped());

        // Re-tripping the same level is not new.
        assert!(!interlock.trip(BreakLevel::Level2));

        assert!(interlock.trip(BreakLevel::Level1));
        assert_eq!(
            interlock.latched_levels(),
            vec![BreakLevel::Level1, BreakLevel::Level2]
        );
    }

    #[test]
    fn test_interlock_acknowledge() {
        let mut interlock = InterlockState::new();

        interlock.trip(BreakLevel::Level3);
        interlock.acknowledge();

        assert!(!interlock.is_tripped());
        assert!(interlock.latched_levels().is_empty());
    }
}
