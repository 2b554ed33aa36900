use std::sync::Mutex;
use std::time::Duration;

use crate::command::{CommandQueue, MoveCommand};
use crate::config::{AxisConfig, MotorConfig};
use crate::driver::{Axis, StepDriver};

/// Step-generator state for one axis.
///
/// The step line toggles on every emitted edge, so a movement of `n` steps
/// runs for `2 * n` edges ("pulses"). `current_delay_us` walks from
/// `start_delay_us` toward `target_delay_us` during acceleration and back
/// again during deceleration, never crossing either bound.
#[derive(Debug, Default)]
struct AxisState {
    /// Steps in the current movement (full or micro, per `microstepping`)
    steps_total: u64,
    /// Step edges left until the movement completes
    pulses_remaining: u64,
    reverse: bool,
    microstepping: bool,
    /// Edges emitted since the last ramp adjustment
    pulses_since_accel: u64,
    start_delay_us: u64,
    target_delay_us: u64,
    current_delay_us: u64,
    /// Time accumulated since the last emitted edge
    idle_us: u64,
}

impl AxisState {
    fn is_idle(&self) -> bool {
        self.pulses_remaining == 0
    }
}

#[derive(Debug, Default)]
struct Shared {
    dec: AxisState,
    ra: AxisState,
    /// Net signed microstep edges since construction, per axis
    dec_balance: i64,
    ra_balance: i64,
}

/// Two-axis stepper controller with a bounded command queue.
///
/// All axis state lives behind a single lock; both the high-frequency
/// [`trigger`](MotorController::trigger) path and the command path serialize
/// through it, and the lock is only ever held for a bounded amount of work.
/// Share the controller between the tick driver and the command path as an
/// `Arc<MotorController<_>>`.
pub struct MotorController<D: StepDriver> {
    config: MotorConfig,
    driver: D,
    shared: Mutex<Shared>,
    queue: CommandQueue,
}

impl<D: StepDriver> MotorController<D> {
    pub fn new(config: MotorConfig, driver: D) -> Self {
        let queue = CommandQueue::new(config.queue_capacity);
        Self {
            config,
            driver,
            shared: Mutex::new(Shared::default()),
            queue,
        }
    }

    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    /// True iff both axes are idle and no commands are pending.
    pub fn is_ready(&self) -> bool {
        let shared = self.shared.lock().unwrap();
        shared.dec.is_idle() && shared.ra.is_idle() && self.queue.is_empty()
    }

    /// Halt both axes immediately and drop all queued commands.
    ///
    /// The cumulative revolution balance is preserved; only pending work is
    /// discarded. There is no deceleration ramp.
    pub fn stop(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.dec.pulses_remaining = 0;
        shared.ra.pulses_remaining = 0;
        self.driver.release(Axis::Dec);
        self.driver.release(Axis::Ra);
        self.queue.clear();
        log::debug!("motors stopped, queue cleared");
    }

    /// Net signed revolutions made by each axis since construction.
    pub fn made_revolutions(&self) -> (f64, f64) {
        let shared = self.shared.lock().unwrap();
        let dec = shared.dec_balance as f64
            / 2.0
            / self.config.dec.steps_per_rev as f64
            / self.config.dec.microstep_multiplier as f64;
        let ra = shared.ra_balance as f64
            / 2.0
            / self.config.ra.steps_per_rev as f64
            / self.config.ra.microstep_multiplier as f64;
        (dec, ra)
    }

    /// Duration of a full-ramp fast turn of the given magnitudes.
    ///
    /// Both axes move concurrently, so the result is the slower of the two.
    pub fn estimate_fast_turn_time(&self, revs_dec: f64, revs_ra: f64) -> Duration {
        let steps_dec = self.config.dec.steps_for_revs(revs_dec, false);
        let steps_ra = self.config.ra.steps_for_revs(revs_ra, false);
        let us_dec = estimate_axis_fast_turn_us(&self.config.dec, steps_dec);
        let us_ra = estimate_axis_fast_turn_us(&self.config.ra, steps_ra);
        Duration::from_micros(us_dec.max(us_ra) as u64)
    }

    /// Accelerated full-step move of the given signed revolutions.
    ///
    /// The fractional remainder that does not land on a whole full step is
    /// queued as a microstepped compensation move, so the final position
    /// matches the commanded angle rather than the nearest full step.
    pub fn fast_turn(&self, revs_dec: f64, revs_ra: f64, queueing: bool) {
        let command = MoveCommand {
            revs_dec,
            revs_ra,
            delay_start_dec_us: self.config.dec.fast_delay_start_us,
            delay_start_ra_us: self.config.ra.fast_delay_start_us,
            delay_end_dec_us: self.config.dec.fast_delay_end_us,
            delay_end_ra_us: self.config.ra.fast_delay_end_us,
            microstepping: false,
        };
        self.turn_internal(command, queueing);
    }

    /// Constant-speed microstepped move at the given revolutions per second.
    pub fn slow_turn(
        &self,
        revs_dec: f64,
        revs_ra: f64,
        speed_dec: f64,
        speed_ra: f64,
        queueing: bool,
    ) {
        let command = self.slow_command(revs_dec, revs_ra, speed_dec, speed_ra);
        self.turn_internal(command, queueing);
    }

    fn slow_command(
        &self,
        revs_dec: f64,
        revs_ra: f64,
        speed_dec: f64,
        speed_ra: f64,
    ) -> MoveCommand {
        let delay_dec = slow_edge_delay_us(&self.config.dec, speed_dec);
        let delay_ra = slow_edge_delay_us(&self.config.ra, speed_ra);
        MoveCommand {
            revs_dec,
            revs_ra,
            delay_start_dec_us: delay_dec,
            delay_start_ra_us: delay_ra,
            delay_end_dec_us: delay_dec,
            delay_end_ra_us: delay_ra,
            microstepping: true,
        }
    }

    fn turn_internal(&self, command: MoveCommand, queueing: bool) {
        if queueing && !self.is_ready() {
            log::debug!(
                "queueing command: dec {:.6} revs, ra {:.6} revs",
                command.revs_dec,
                command.revs_ra
            );
            self.queue.push(command);
            return;
        }
        let compensation = {
            let mut shared = self.shared.lock().unwrap();
            self.start_locked(&mut shared, command)
        };
        if let Some(command) = compensation {
            self.turn_internal(command, true);
        }
    }

    /// Install a command on both axes. Returns the microstepped compensation
    /// move for the fractional remainder of a full-step command, if any.
    fn start_locked(&self, shared: &mut Shared, command: MoveCommand) -> Option<MoveCommand> {
        let steps_dec = self
            .config
            .dec
            .steps_for_revs(command.revs_dec, command.microstepping);
        let steps_ra = self
            .config
            .ra
            .steps_for_revs(command.revs_ra, command.microstepping);

        log::debug!(
            "starting movement: dec {:.6} revs ({} steps), ra {:.6} revs ({} steps), microstepping {}",
            command.revs_dec,
            steps_dec,
            command.revs_ra,
            steps_ra,
            command.microstepping
        );

        start_axis(
            &mut shared.dec,
            steps_dec,
            command.revs_dec < 0.0,
            command.microstepping,
            command.delay_start_dec_us,
            command.delay_end_dec_us,
        );
        start_axis(
            &mut shared.ra,
            steps_ra,
            command.revs_ra < 0.0,
            command.microstepping,
            command.delay_start_ra_us,
            command.delay_end_ra_us,
        );

        self.driver.set_microstepping(Axis::Dec, command.microstepping);
        self.driver.set_microstepping(Axis::Ra, command.microstepping);
        self.driver.set_direction(Axis::Dec, command.revs_dec < 0.0);
        self.driver.set_direction(Axis::Ra, command.revs_ra < 0.0);

        if command.microstepping {
            return None;
        }

        // Whole full steps cannot represent the commanded angle exactly;
        // queue the remainder as a slow microstepped move.
        let done_dec = self.config.dec.revs_for_steps(steps_dec as f64, false);
        let done_ra = self.config.ra.revs_for_steps(steps_ra as f64, false);
        let leftover_dec = command.revs_dec - command.revs_dec.signum() * done_dec;
        let leftover_ra = command.revs_ra - command.revs_ra.signum() * done_ra;

        let micro_dec = self.config.dec.steps_for_revs(leftover_dec, true);
        let micro_ra = self.config.ra.steps_for_revs(leftover_ra, true);
        if micro_dec == 0 && micro_ra == 0 {
            return None;
        }

        Some(self.slow_command(
            leftover_dec,
            leftover_ra,
            self.config.dec.fast_revs_per_sec / self.config.dec.microstep_multiplier as f64,
            self.config.ra.fast_revs_per_sec / self.config.ra.microstep_multiplier as f64,
        ))
    }

    /// Real-time heartbeat: advance both axes by at most one edge each.
    ///
    /// Must be called every `tick_interval_us`. A missed tick lengthens the
    /// effective step period; it is degradation, not an error.
    pub fn trigger(&self) {
        let started = {
            let mut shared = self.shared.lock().unwrap();

            // Both axes done: pull the next command off the queue.
            let mut started = None;
            if shared.dec.is_idle() && shared.ra.is_idle() {
                if let Some(command) = self.queue.try_pop() {
                    started = self.start_locked(&mut shared, command);
                }
            }

            let tick = self.config.tick_interval_us;
            let dec_delta = axis_trigger(&mut shared.dec, Axis::Dec, &self.driver, tick, &self.config.dec);
            shared.dec_balance += dec_delta;
            let ra_delta = axis_trigger(&mut shared.ra, Axis::Ra, &self.driver, tick, &self.config.ra);
            shared.ra_balance += ra_delta;

            adjust_ramp(&mut shared.dec, &self.config.dec);
            adjust_ramp(&mut shared.ra, &self.config.ra);
            started
        };

        // Fractional compensation of a dequeued fast command; pushed outside
        // the state lock (a queue slot was just freed by the pop above).
        if let Some(command) = started {
            self.turn_internal(command, true);
        }
    }
}

fn start_axis(
    axis: &mut AxisState,
    steps: u64,
    reverse: bool,
    microstepping: bool,
    start_delay_us: u64,
    target_delay_us: u64,
) {
    axis.steps_total = steps;
    axis.pulses_remaining = steps * 2;
    axis.reverse = reverse;
    axis.microstepping = microstepping;
    axis.pulses_since_accel = 0;
    axis.start_delay_us = start_delay_us;
    axis.target_delay_us = target_delay_us;
    axis.current_delay_us = start_delay_us;
    axis.idle_us = 0;
}

/// Emit one step edge if this axis' delay has elapsed. Returns the signed
/// microstep-edge contribution to the axis balance.
fn axis_trigger<D: StepDriver>(
    axis: &mut AxisState,
    which: Axis,
    driver: &D,
    tick_us: u64,
    config: &AxisConfig,
) -> i64 {
    if axis.pulses_remaining == 0 {
        return 0;
    }
    axis.idle_us += tick_us;
    if axis.idle_us < axis.current_delay_us {
        return 0;
    }
    axis.idle_us = 0;
    axis.pulses_since_accel += 1;
    axis.pulses_remaining -= 1;

    driver.set_direction(which, axis.reverse);
    driver.toggle_step(which);

    let unit = if axis.microstepping {
        1
    } else {
        config.microstep_multiplier as i64
    };
    if axis.reverse {
        -unit
    } else {
        unit
    }
}

/// Re-evaluate the acceleration ramp once enough edges have passed.
///
/// In the first half of the movement the delay steps toward the target
/// (acceleration); once the remaining distance only just fits the climb back
/// to the start delay, it steps toward the start (deceleration). The delay is
/// clamped so it never crosses either bound.
fn adjust_ramp(axis: &mut AxisState, config: &AxisConfig) {
    let change_pulses = config.accel_change_steps as u64 * 2;
    if axis.pulses_since_accel < change_pulses {
        return;
    }
    axis.pulses_since_accel = 0;

    if axis.pulses_remaining == 0 || config.accel_delay_step_us == 0 {
        return;
    }

    if axis.pulses_remaining > axis.steps_total {
        // First half of the movement: speed up toward the target delay.
        if axis.current_delay_us > axis.target_delay_us {
            axis.current_delay_us = axis
                .current_delay_us
                .saturating_sub(config.accel_delay_step_us)
                .max(axis.target_delay_us);
        }
    } else if axis.current_delay_us < axis.start_delay_us {
        // Deceleration zone: the adjustments still needed to climb back to
        // the start delay must fit into the remaining edges.
        let climbs_needed = (axis.start_delay_us - axis.current_delay_us) / config.accel_delay_step_us;
        let windows_left = axis.pulses_remaining / change_pulses;
        if climbs_needed >= windows_left {
            axis.current_delay_us = (axis.current_delay_us + config.accel_delay_step_us)
                .min(axis.start_delay_us);
        }
    }
}

/// Edge delay for a constant-speed microstepped move, in microseconds.
fn slow_edge_delay_us(config: &AxisConfig, revs_per_sec: f64) -> u64 {
    if revs_per_sec <= 0.0 {
        // Paired with a zero step count; the value only has to be harmless.
        return u64::MAX >> 1;
    }
    let edges_per_sec = 2.0
        * revs_per_sec
        * config.steps_per_rev as f64
        * config.microstep_multiplier as f64;
    (1_000_000.0 / edges_per_sec) as u64
}

/// Elapsed time of a full acceleration-ramped movement, in microseconds.
///
/// Mirrors the ramp logic in `adjust_ramp`: the delay drops by
/// `accel_delay_step_us` every `accel_change_steps` steps during the first
/// half, cruises at whatever delay the ramp reached, and climbs back
/// symmetrically.
fn estimate_axis_fast_turn_us(config: &AxisConfig, steps: u64) -> f64 {
    let total = steps as f64;
    let window = config.accel_change_steps as f64;
    let end = config.fast_delay_end_us as f64;

    let mut delay = config.fast_delay_start_us as f64;
    let mut ramp_time = 0.0;
    let mut ramp_steps = 0.0;

    while ramp_steps + window < total / 2.0 && delay > end {
        ramp_time += 2.0 * delay * window;
        ramp_steps += window;
        delay = (delay - config.accel_delay_step_us as f64).max(end);
    }

    let cruise_steps = total - 2.0 * ramp_steps;
    2.0 * ramp_time + cruise_steps * 2.0 * delay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::RecordingDriver;

    fn test_config() -> MotorConfig {
        let axis = AxisConfig {
            steps_per_rev: 20,
            microstep_multiplier: 4,
            fast_delay_start_us: 100,
            fast_delay_end_us: 40,
            accel_change_steps: 2,
            accel_delay_step_us: 20,
            fast_revs_per_sec: 2.0,
            ..AxisConfig::default()
        };
        MotorConfig {
            dec: axis.clone(),
            ra: axis,
            tick_interval_us: 20,
            queue_capacity: 8,
        }
    }

    fn drain<D: StepDriver>(controller: &MotorController<D>) {
        let mut guard = 0u64;
        while !controller.is_ready() {
            controller.trigger();
            guard += 1;
            assert!(guard < 10_000_000, "controller never became ready");
        }
    }

    #[test]
    fn fresh_controller_is_ready() {
        let controller = MotorController::new(test_config(), RecordingDriver::new());
        assert!(controller.is_ready());
        assert_eq!(controller.made_revolutions(), (0.0, 0.0));
    }

    #[test]
    fn fast_turn_reaches_commanded_revolutions() {
        let controller = MotorController::new(test_config(), RecordingDriver::new());
        controller.fast_turn(1.0, -0.5, false);
        assert!(!controller.is_ready());
        drain(&controller);
        let (dec, ra) = controller.made_revolutions();
        assert!((dec - 1.0).abs() < 1e-9, "dec balance {dec}");
        assert!((ra + 0.5).abs() < 1e-9, "ra balance {ra}");
    }

    #[test]
    fn fractional_fast_turn_compensated_by_microstepping() {
        let controller = MotorController::new(test_config(), RecordingDriver::new());
        // 0.33 revs is 6.6 full steps; the 0.6-step remainder needs the
        // microstepped compensation move to land on the commanded angle.
        controller.fast_turn(0.33, 0.0, false);
        drain(&controller);
        let (dec, _) = controller.made_revolutions();
        // Resolution is one microstep (1/80 rev here)
        assert!((dec - 0.33).abs() <= 1.0 / 80.0 + 1e-9, "dec balance {dec}");
        assert!((dec - 0.33).abs() < 0.33 - 6.0 / 20.0, "no compensation applied");
    }

    #[test]
    fn stop_discards_remaining_work_but_keeps_balance() {
        let controller = MotorController::new(test_config(), RecordingDriver::new());
        controller.fast_turn(1.0, 0.0, false);
        for _ in 0..500 {
            controller.trigger();
        }
        let (partial, _) = controller.made_revolutions();
        assert!(partial > 0.0);
        controller.stop();
        assert!(controller.is_ready());
        // Balance survives the stop
        let (after, _) = controller.made_revolutions();
        assert_eq!(partial, after);
    }

    #[test]
    fn queued_commands_run_in_fifo_order_after_current() {
        let driver = RecordingDriver::new();
        let controller = MotorController::new(test_config(), driver);
        controller.fast_turn(0.25, 0.0, false);
        controller.slow_turn(0.05, 0.0, 0.1, 0.1, true);
        controller.slow_turn(-0.05, 0.0, 0.1, 0.1, true);
        drain(&controller);
        let (dec, _) = controller.made_revolutions();
        assert!((dec - 0.25).abs() < 1e-9, "dec balance {dec}");
    }

    #[test]
    fn slow_turn_pace_matches_requested_speed() {
        let controller = MotorController::new(test_config(), RecordingDriver::new());
        // 0.1 rev/s over 0.05 revs should take 0.5 simulated seconds
        controller.slow_turn(0.05, 0.0, 0.1, 0.1, false);
        let mut ticks = 0u64;
        while !controller.is_ready() {
            controller.trigger();
            ticks += 1;
            assert!(ticks < 1_000_000);
        }
        let elapsed_s = (ticks * controller.config().tick_interval_us) as f64 / 1e6;
        assert!(
            (elapsed_s - 0.5).abs() < 0.05,
            "elapsed {elapsed_s}s, expected 0.5s"
        );
    }

    #[test]
    fn ramp_never_overshoots_target_delay() {
        let config = test_config();
        let mut axis = AxisState::default();
        start_axis(&mut axis, 1000, false, false, 100, 40);
        let driver = RecordingDriver::new();
        let mut min_delay = u64::MAX;
        while axis.pulses_remaining > 0 {
            axis_trigger(&mut axis, Axis::Dec, &driver, 20, &config.dec);
            adjust_ramp(&mut axis, &config.dec);
            min_delay = min_delay.min(axis.current_delay_us);
            assert!(axis.current_delay_us >= 40);
            assert!(axis.current_delay_us <= 100);
        }
        assert_eq!(min_delay, 40, "ramp never reached full speed");
    }

    #[test]
    fn estimate_equals_closed_form_phase_sum() {
        let controller = MotorController::new(test_config(), RecordingDriver::new());
        // One revolution is 20 full steps. With a 2-step ramp window the
        // edge delay walks 100 -> 80 -> 60 and reaches the 40us floor, so
        // each ramp covers 6 steps and 8 steps cruise in between. Two edges
        // per step.
        let ramp_us: f64 = [100.0, 80.0, 60.0].iter().map(|d| 2.0 * 2.0 * d).sum();
        let cruise_us = 8.0 * 2.0 * 40.0;
        let expected_us = 2.0 * ramp_us + cruise_us;
        let estimate = controller.estimate_fast_turn_time(1.0, 0.0);
        assert_eq!(estimate.as_micros(), expected_us as u128);
    }

    #[test]
    fn estimate_matches_simulated_execution() {
        let controller = MotorController::new(test_config(), RecordingDriver::new());
        let estimate = controller.estimate_fast_turn_time(1.0, 0.0);
        controller.fast_turn(1.0, 0.0, false);
        // Count ticks for the full-step part only: stop before the queued
        // microstep compensation (none here, 1.0 revs is exact).
        let mut ticks = 0u64;
        while !controller.is_ready() {
            controller.trigger();
            ticks += 1;
            assert!(ticks < 10_000_000);
        }
        let simulated_us = ticks * controller.config().tick_interval_us;
        let estimate_us = estimate.as_micros() as u64;
        let tolerance = estimate_us / 10 + 1000;
        assert!(
            simulated_us.abs_diff(estimate_us) < tolerance,
            "simulated {simulated_us}us vs estimate {estimate_us}us"
        );
    }
}
