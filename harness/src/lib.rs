//! Time-warped simulation helpers for driving the motion stack on a host.
//!
//! The motor controller's `trigger()` models one tick interval per call, so
//! a tight loop runs the mechanics arbitrarily faster than real time. These
//! helpers keep the [`mount::FixedClock`] in step with the simulated ticks
//! so the sidereal bookkeeping stays consistent.

use std::sync::Arc;
use std::time::Duration;

use motion::{MotorController, StepDriver};
use mount::FixedClock;

/// Run the trigger loop for a fixed amount of simulated time, advancing the
/// clock to match.
pub fn run_simulated<D: StepDriver>(
    motors: &Arc<MotorController<D>>,
    clock: &FixedClock,
    simulated: Duration,
) {
    let tick_us = motors.config().tick_interval_us;
    let ticks = simulated.as_micros() as u64 / tick_us;
    for _ in 0..ticks {
        motors.trigger();
    }
    clock.advance(simulated);
}

/// Tick until the controller goes ready, or give up after `max_simulated`.
/// Returns the simulated time spent.
pub fn settle<D: StepDriver>(
    motors: &Arc<MotorController<D>>,
    clock: &FixedClock,
    max_simulated: Duration,
) -> Option<Duration> {
    let tick_us = motors.config().tick_interval_us;
    let max_ticks = max_simulated.as_micros() as u64 / tick_us;
    for tick in 0..max_ticks {
        if motors.is_ready() {
            let elapsed = Duration::from_micros(tick * tick_us);
            clock.advance(elapsed);
            return Some(elapsed);
        }
        motors.trigger();
    }
    clock.advance(max_simulated);
    None
}
