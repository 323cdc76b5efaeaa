pub const NUM_CONTROL_CHANNEL: usize = 4;
pub const NUM_BREAK_LEVEL: usize = 3;

// Full scale of the pulse-width modulation (PWM) counters on the rig.
pub const PWM_FULL_SCALE: f64 = 255.0;

// Fallback diameter coefficient in mm/pixel used when no calibration
// record exists on disk. Measured on the reference camera mount.
pub const FALLBACK_DIAMETER_COEFFICIENT: f64 = 0.00782324;

// Idle fan duty cycle in percent. The fan keeps turning at this duty when
// an interlock trips; the motors and the heater drop to zero instead.
pub const SAFE_FAN_DUTY_CYCLE: f64 = 30.0;

pub const BOUND_SYNC_CHANNEL: usize = 100;
