pub mod device;
pub mod telemetry_sink;
