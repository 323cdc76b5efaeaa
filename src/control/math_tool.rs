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

/// Clip the value to the range.
///
/// # Arguments
/// * `value` - Value to clip.
/// * `min` - Minimum of the range.
/// * `max` - Maximum of the range.
///
/// # Returns
/// The clipped value.
pub fn clip<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Calculate the mean of the values.
///
/// # Arguments
/// * `values` - Values to average.
///
/// # Returns
/// The mean. Return 0.0 if the values are empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<f64>() / (values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const EPSILON: f64 = 1e-7;

    #[test]
    fn test_clip() {
        assert_eq!(clip(1.0, 0.0, 2.0), 1.0);
        assert_eq!(clip(-1.0, 0.0, 2.0), 0.0);
        assert_eq!(clip(3.0, 0.0, 2.0), 2.0);

        assert_eq!(clip(3, 0, 2), 2);
    }

    #[test]
    fn test_mean() {
        assert_relative_eq!(mean(&Vec::new()), 0.0, epsilon = EPSILON);
        assert_relative_eq!(mean(&vec![1.0]), 1.0, epsilon = EPSILON);
        assert_relative_eq!(mean(&vec![1.0, 2.0, 3.0]), 2.0, epsilon = EPSILON);
        assert_relative_eq!(
            mean(&vec![127.8, 127.9, 127.86, 127.88, 127.86]),
            127.86,
            epsilon = EPSILON
        );
    }
}
