use serde_json::Value;

pub trait TelemetryDefault {
    /// Round a value to a specific digit.
    ///
    /// # Arguments
    /// * `value` - The value to be rounded.
    /// * `digit` - The number of digits after the decimal point.
    ///
    /// # Returns
    /// The rounded value.
    fn round(&self, value: f64, digit: i32) -> f64 {
        let normalized = 10.0_f64.powi(digit);
        (value * normalized).round() / normalized
    }

    /// Get the telemetry messages.
    ///
    /// # Arguments
    /// * `digit` - The number of digits after the decimal point.
    ///
    /// # Returns
    /// The messages.
    fn get_messages(&self, digit: i32) -> Vec<Value>;
}
