use serde_json::Value;

use crate::telemetry::telemetry_control_loop::TelemetryControlLoop;

pub struct Telemetry {
    // Telemetry of the control loop.
    pub control_loop: Option<TelemetryControlLoop>,
    // Command execution result.
    pub command_result: Option<Value>,
    // Events to publish.
    pub events: Option<Vec<Value>>,
}

impl Telemetry {
    /// Create a new telemetry object.
    ///
    /// # Arguments
    /// * `control_loop` - Telemetry of the control loop.
    /// * `command_result` - Command execution result.
    /// * `events` - Events to publish.
    ///
    /// # Returns
    /// A new telemetry object.
    pub fn new(
        control_loop: Option<TelemetryControlLoop>,
        command_result: Option<Value>,
        events: Option<Vec<Value>>,
    ) -> Self {
        Self {
            control_loop: control_loop,
            command_result: command_result,
            events: events,
        }
    }
}
