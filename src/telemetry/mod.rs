pub mod event;
pub mod telemetry;
pub mod telemetry_control_loop;
pub mod telemetry_default;
