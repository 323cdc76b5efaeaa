use log::info;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::measurement::MeasurementHandle;
use crate::mock::mock_constants::PLANT_CAMERA_MM_PER_PIXEL;
use crate::mock::mock_plant::MockPlant;

/// Mock camera acquisition path. It drives the plant dynamics at the
/// measurement cadence and publishes the fiber width in pixels into the
/// single-slot handoff, the same way the real image pipeline would.
pub struct MockCamera {
    // The mock plant.
    _plant: Arc<Mutex<MockPlant>>,
    // Measurement handoff.
    _measurement: Arc<MeasurementHandle>,
    // Acquisition period in milliseconds.
    _period_ms: u64,
    // Stop the loop.
    _stop: Arc<AtomicBool>,
}

impl MockCamera {
    /// Create a new mock camera.
    ///
    /// # Arguments
    /// * `plant` - The mock plant.
    /// * `measurement` - Measurement handoff.
    /// * `period_ms` - Acquisition period in milliseconds.
    /// * `stop` - An Arc instance that holds the AtomicBool instance to stop
    /// the loop.
    ///
    /// # Returns
    /// A new mock camera.
    pub fn new(
        plant: &Arc<Mutex<MockPlant>>,
        measurement: &Arc<MeasurementHandle>,
        period_ms: u64,
        stop: &Arc<AtomicBool>,
    ) -> Self {
        Self {
            _plant: plant.clone(),
            _measurement: measurement.clone(),
            _period_ms: period_ms,
            _stop: stop.clone(),
        }
    }

    /// Run the acquisition loop.
    pub fn run(&mut self) {
        info!("Camera acquisition is running.");

        let mut last_frame = Instant::now();
        while !self._stop.load(Ordering::Relaxed) {
            sleep(Duration::from_millis(self._period_ms));

            let now = Instant::now();
            let dt = now.duration_since(last_frame).as_secs_f64();
            last_frame = now;

            let raw_pixel_width = {
                let mut plant = self._plant.lock().expect("Mock plant should lock.");
                plant.update(dt);

                plant.diameter_mm() / PLANT_CAMERA_MM_PER_PIXEL
            };

            self._measurement.publish_raw(raw_pixel_width);
        }

        info!("Camera acquisition is stopped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread::spawn;

    #[test]
    fn test_run() {
        let plant = Arc::new(Mutex::new(MockPlant::new(25.0)));
        let measurement = Arc::new(MeasurementHandle::new(PLANT_CAMERA_MM_PER_PIXEL));
        let stop = Arc::new(AtomicBool::new(false));

        let mut camera = MockCamera::new(&plant, &measurement, 10, &stop);
        let handle = spawn(move || {
            camera.run();
        });

        sleep(Duration::from_millis(200));

        stop.store(true, Ordering::Relaxed);
        assert!(handle.join().is_ok());

        // Samples were published and the diameter tracks the plant.
        let sample = measurement.latest_sample().unwrap();

        assert!(sample.sequence > 1);
        assert!((sample.diameter_mm - plant.lock().unwrap().diameter_mm()).abs() < 0.01);
    }
}
