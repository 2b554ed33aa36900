//! Shared rig for the mount integration tests: a motor controller with
//! coarse test gearing (fast to simulate) plus a pinned clock.

use std::sync::Arc;
use std::time::Duration;

use motion::{AxisConfig, MotorConfig, MotorController, RecordingDriver};
use mount::{FixedClock, MountConfig, MountController};

/// Mount degrees per microstep with the test gearing below.
pub const MICROSTEP_DEG: f64 = 360.0 / (20.0 * 4.0 * 8.0);

pub fn test_motor_config() -> MotorConfig {
    let axis = AxisConfig {
        steps_per_rev: 20,
        microstep_multiplier: 4,
        fast_delay_start_us: 100,
        fast_delay_end_us: 40,
        accel_change_steps: 2,
        accel_delay_step_us: 20,
        fast_revs_per_sec: 2.0,
    };
    MotorConfig {
        dec: axis.clone(),
        ra: axis,
        tick_interval_us: 20,
        queue_capacity: 8,
    }
}

pub fn test_mount_config() -> MountConfig {
    MountConfig {
        gear_ratio_dec: 8.0,
        gear_ratio_ra: 8.0,
        ..MountConfig::default()
    }
}

pub struct Rig {
    pub motors: Arc<MotorController<RecordingDriver>>,
    pub clock: Arc<FixedClock>,
    pub mount: MountController<RecordingDriver>,
}

pub fn rig() -> Rig {
    let _ = env_logger::builder().is_test(true).try_init();
    let motors = Arc::new(MotorController::new(
        test_motor_config(),
        RecordingDriver::new(),
    ));
    let clock = Arc::new(FixedClock::at_j2000());
    let mount = MountController::new(test_mount_config(), motors.clone(), clock.clone());
    Rig {
        motors,
        clock,
        mount,
    }
}

impl Rig {
    /// Tick until the motors go idle, advancing the clock by the simulated
    /// time spent. Panics if the movement never settles.
    pub fn settle(&self) -> Duration {
        let tick_us = self.motors.config().tick_interval_us;
        let mut ticks: u64 = 0;
        while !self.motors.is_ready() {
            self.motors.trigger();
            ticks += 1;
            assert!(ticks < 50_000_000, "movement never settled");
        }
        let elapsed = Duration::from_micros(ticks * tick_us);
        self.clock.advance(elapsed);
        elapsed
    }

    /// Run the trigger loop for a fixed simulated duration.
    pub fn run_for(&self, simulated: Duration) {
        let tick_us = self.motors.config().tick_interval_us;
        let ticks = simulated.as_micros() as u64 / tick_us;
        for _ in 0..ticks {
            self.motors.trigger();
        }
        self.clock.advance(simulated);
    }
}

/// Smallest absolute angular difference on the circle, in degrees.
pub fn ra_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}
