use crate::constants::FALLBACK_DIAMETER_COEFFICIENT;

// Maximum speeds at the full PWM duty.
pub const PLANT_EXTRUDER_MAX_RPM: f64 = 20.0;
pub const PLANT_SPOOL_MAX_RPM: f64 = 60.0;
pub const PLANT_FAN_MAX_RPM: f64 = 3000.0;

// Heating rate in degree Celsius per second at the full heater duty.
pub const PLANT_HEATER_GAIN: f64 = 1.5;
// Passive cooling rate toward the ambient temperature per second.
pub const PLANT_COOLING_RATE: f64 = 0.01;
// Additional cooling rate per second at the full fan duty.
pub const PLANT_FAN_COOLING_RATE: f64 = 0.02;

// First-order time constant of the motors and the fan in second.
pub const PLANT_MOTOR_TIME_CONSTANT: f64 = 0.5;

// Fiber diameter in millimeter at a draw ratio of one.
pub const PLANT_DIAMETER_GAIN: f64 = 2.475;

// True optical scale of the simulated camera in mm/pixel.
pub const PLANT_CAMERA_MM_PER_PIXEL: f64 = FALLBACK_DIAMETER_COEFFICIENT;
