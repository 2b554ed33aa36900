use serde::{Deserialize, Serialize};

/// Stepper and ramp parameters for a single axis.
///
/// Delays are expressed in microseconds between step *edges*; the step line
/// toggles on every edge, so a full step takes two edge delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Full steps per motor shaft revolution
    pub steps_per_rev: u32,
    /// Microstep subdivision used for slow (tracking) moves
    pub microstep_multiplier: u32,
    /// Edge delay at the start of a fast move (slowest point of the ramp)
    pub fast_delay_start_us: u64,
    /// Edge delay at full fast speed (fastest point of the ramp)
    pub fast_delay_end_us: u64,
    /// Full steps between consecutive ramp adjustments
    pub accel_change_steps: u32,
    /// Microseconds removed from (or added to) the edge delay per adjustment
    pub accel_delay_step_us: u64,
    /// Nominal fast speed, used to pace the fractional compensation move
    pub fast_revs_per_sec: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            steps_per_rev: 200,
            microstep_multiplier: 16,
            fast_delay_start_us: 800,
            fast_delay_end_us: 120,
            accel_change_steps: 16,
            accel_delay_step_us: 10,
            fast_revs_per_sec: 2.0,
        }
    }
}

impl AxisConfig {
    /// Full-step or microstep count for a signed number of revolutions.
    pub fn steps_for_revs(&self, revs: f64, microstepping: bool) -> u64 {
        let per_rev = self.steps_per_rev as f64
            * if microstepping {
                self.microstep_multiplier as f64
            } else {
                1.0
            };
        (revs.abs() * per_rev) as u64
    }

    /// Revolutions covered by a step count at the given stepping mode.
    pub fn revs_for_steps(&self, steps: f64, microstepping: bool) -> f64 {
        let per_rev = self.steps_per_rev as f64
            * if microstepping {
                self.microstep_multiplier as f64
            } else {
                1.0
            };
        steps / per_rev
    }
}

/// Configuration for the two-axis motor controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorConfig {
    pub dec: AxisConfig,
    pub ra: AxisConfig,
    /// Period of the periodic `trigger()` call, in microseconds
    pub tick_interval_us: u64,
    /// Capacity of the pending-command queue
    pub queue_capacity: usize,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            dec: AxisConfig::default(),
            ra: AxisConfig::default(),
            tick_interval_us: 20,
            queue_capacity: 8,
        }
    }
}
