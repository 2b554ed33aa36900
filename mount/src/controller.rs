//! The mount controller: sky-coordinate requests in, motor commands out.
//!
//! Orientation is never cached here. Every query converts the motor
//! controller's cumulative revolution balance into the local frame and, when
//! asked for celestial coordinates, pushes it through the inverse pole
//! transform and the hour-angle conversion at the current sidereal time.

use std::sync::{Arc, Mutex};

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use motion::{MotorController, StepDriver};

use crate::alignment::{fit_pole, AlignmentConfig};
use crate::clock::MountClock;
use crate::coords::{wrap_180, wrap_360, EquatorialCoord, PoleModel};
use crate::error::MountError;
use crate::precession::precess_from_j2000;
use crate::SIDEREAL_RATE_DEG_PER_HOUR;

/// Mechanical and calibration parameters of the mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    /// Motor shaft revolutions per full mount-axis revolution
    pub gear_ratio_dec: f64,
    pub gear_ratio_ra: f64,
    /// Pole assumed at startup, before any alignment
    pub default_pole: PoleModel,
    pub alignment: AlignmentConfig,
    /// Distance, in hours of sidereal motion, covered by one tracking
    /// command before the queue drains
    pub tracking_horizon_hours: f64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            gear_ratio_dec: 144.0,
            gear_ratio_ra: 144.0,
            default_pole: PoleModel::default(),
            alignment: AlignmentConfig::default(),
            tracking_horizon_hours: 24.0,
        }
    }
}

#[derive(Debug)]
struct State {
    pole: PoleModel,
    transition: Matrix3<f64>,
    transition_inverse: Matrix3<f64>,
    is_tracking: bool,
    target: EquatorialCoord,
}

impl State {
    fn new(pole: PoleModel) -> Self {
        let transition = pole.transition();
        Self {
            pole,
            transition,
            transition_inverse: transition.transpose(),
            is_tracking: false,
            target: EquatorialCoord::new(0.0, 0.0),
        }
    }

    fn set_pole(&mut self, pole: PoleModel) {
        self.transition = pole.transition();
        self.transition_inverse = self.transition.transpose();
        self.pole = pole;
    }
}

/// Coordinate kinematics, calibration and tracking for a two-axis
/// equatorial mount.
///
/// Owns a shared handle to the [`MotorController`] (the tick driver holds
/// the other one) and the injected [`MountClock`] capability.
pub struct MountController<D: StepDriver> {
    config: MountConfig,
    motors: Arc<MotorController<D>>,
    clock: Arc<dyn MountClock>,
    state: Mutex<State>,
}

impl<D: StepDriver> MountController<D> {
    pub fn new(
        config: MountConfig,
        motors: Arc<MotorController<D>>,
        clock: Arc<dyn MountClock>,
    ) -> Self {
        let state = State::new(config.default_pole.normalized());
        Self {
            config,
            motors,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Reset to the cold-start state: motors stopped, default pole
    /// installed, target cleared. Calibration is volatile by design; it is
    /// re-established from scratch on every start.
    pub fn initialize(&self) {
        self.motors.stop();
        let mut state = self.state.lock().unwrap();
        *state = State::new(self.config.default_pole.normalized());
        log::debug!("mount initialized with pole {:?}", state.pole);
    }

    /// The currently installed pole model.
    pub fn pole(&self) -> PoleModel {
        self.state.lock().unwrap().pole
    }

    /// True while any movement (slew, compensation or tracking) is pending.
    pub fn is_moving(&self) -> bool {
        !self.motors.is_ready()
    }

    /// Halt everything immediately.
    pub fn stop_all(&self) {
        self.motors.stop();
        self.state.lock().unwrap().is_tracking = false;
    }

    /// Last commanded target pair.
    pub fn get_target(&self) -> EquatorialCoord {
        self.state.lock().unwrap().target
    }

    /// Raw orientation derived from the motor step balance, pole-unaware.
    pub fn get_local_mount_orientation(&self) -> EquatorialCoord {
        let (dec_revs, ra_revs) = self.motors.made_revolutions();
        let local = EquatorialCoord::new(
            dec_revs / self.config.gear_ratio_dec * 360.0,
            ra_revs / self.config.gear_ratio_ra * 360.0,
        );
        if !local.is_valid() {
            // Calibration or caller error upstream; stay commandable and
            // report the raw value rather than halting.
            log::error!(
                "local orientation out of domain: dec {:.4}, ra {:.4}",
                local.dec_deg,
                local.ra_deg
            );
        }
        local
    }

    /// Celestial orientation: local frame through the inverse pole
    /// transform, then hour angle back to right ascension.
    pub fn get_global_mount_orientation(&self) -> EquatorialCoord {
        let state = self.state.lock().unwrap();
        let local = self.get_local_mount_orientation();
        self.local_to_global(&state, local)
    }

    /// Slew to an absolute celestial coordinate.
    ///
    /// Runs the two-pass estimate-then-correct sequence: the sky keeps
    /// moving while the mount slews, so the target RA is advanced by the
    /// estimated travel time before the final turn is issued. A single pass
    /// would systematically miss fast-moving targets.
    pub fn move_absolute(&self, dec_deg: f64, ra_deg: f64) -> Result<(), MountError> {
        let target = EquatorialCoord::new(dec_deg, ra_deg);
        if !target.is_valid() {
            log::warn!("rejecting slew to dec {dec_deg:.4}, ra {ra_deg:.4}: out of range");
            return Err(MountError::TargetOutOfRange { dec_deg, ra_deg });
        }

        self.motors.stop();
        let mut state = self.state.lock().unwrap();
        state.is_tracking = false;

        let local_now = self.get_local_mount_orientation();

        // First pass: where would we go if the sky stood still?
        let local_target = self.global_to_local(&state, target, 0.0);
        let (revs_dec, revs_ra) = self.revs_between(local_now, local_target);
        let travel = self.motors.estimate_fast_turn_time(revs_dec, revs_ra);
        let travel_hours = travel.as_secs_f64() / 3600.0;

        // Second pass against the target position at arrival time.
        let local_target = self.global_to_local(&state, target, travel_hours);
        let (revs_dec, revs_ra) = self.revs_between(local_now, local_target);

        log::debug!(
            "slewing: dec {:.4} -> {:.4}, ra {:.4} -> {:.4} (local), {:.4}/{:.4} revs, ~{:.1}s",
            local_now.dec_deg,
            local_target.dec_deg,
            local_now.ra_deg,
            local_target.ra_deg,
            revs_dec,
            revs_ra,
            travel.as_secs_f64()
        );

        self.motors.fast_turn(revs_dec, revs_ra, false);
        state.target = target;
        Ok(())
    }

    /// Slew to a J2000 catalog coordinate, precessing it to the current
    /// epoch first.
    pub fn move_absolute_j2000(&self, dec_deg: f64, ra_deg: f64) -> Result<(), MountError> {
        let catalog = EquatorialCoord::new(dec_deg, ra_deg);
        if !catalog.is_valid() {
            log::warn!("rejecting J2000 slew to dec {dec_deg:.4}, ra {ra_deg:.4}: out of range");
            return Err(MountError::TargetOutOfRange { dec_deg, ra_deg });
        }
        let now = precess_from_j2000(catalog, self.clock.now());
        self.move_absolute(now.dec_deg, now.ra_deg)
    }

    /// Relative move in the raw local frame.
    ///
    /// Declination is clamped so the axis never passes +-90 degrees; RA is
    /// clamped into `[0, 360)` to keep cabling from winding up. The clamps
    /// reduce the requested delta, they do not reject it.
    pub fn move_relative_local(&self, delta_dec_deg: f64, delta_ra_deg: f64) {
        let current = self.get_local_mount_orientation();

        let mut delta_dec = delta_dec_deg % 180.0;
        let mut delta_ra = delta_ra_deg % 360.0;

        if current.dec_deg + delta_dec < -90.0 {
            delta_dec = -90.0 - current.dec_deg;
        } else if current.dec_deg + delta_dec > 90.0 {
            delta_dec = 90.0 - current.dec_deg;
        }

        if current.ra_deg + delta_ra < 0.0 {
            delta_ra = -current.ra_deg;
        } else if current.ra_deg + delta_ra > 360.0 {
            delta_ra = 360.0 - current.ra_deg;
        }

        self.motors.stop();
        self.state.lock().unwrap().is_tracking = false;

        let revs_dec = delta_dec / 360.0 * self.config.gear_ratio_dec;
        let revs_ra = delta_ra / 360.0 * self.config.gear_ratio_ra;
        log::debug!("relative local move: dec {delta_dec:.4} deg, ra {delta_ra:.4} deg");
        self.motors.fast_turn(revs_dec, revs_ra, false);
    }

    /// Relative move in the celestial frame, with pole-flip handling: a
    /// declination pushed past +-90 reflects and adds 180 degrees of RA,
    /// the way a point passes over the pole.
    pub fn move_relative_global(&self, delta_dec_deg: f64, delta_ra_deg: f64) {
        let delta_dec = wrap_180(delta_dec_deg);
        let mut delta_ra = wrap_180(delta_ra_deg);

        self.motors.stop();
        let mut state = self.state.lock().unwrap();
        state.is_tracking = false;

        let local_now = self.get_local_mount_orientation();
        let mut global = self.local_to_global(&state, local_now);

        global.dec_deg += delta_dec;
        if global.dec_deg > 90.0 {
            global.dec_deg = 180.0 - global.dec_deg;
            delta_ra += 180.0;
        } else if global.dec_deg < -90.0 {
            global.dec_deg = -180.0 - global.dec_deg;
            delta_ra += 180.0;
        }
        global.ra_deg = wrap_360(global.ra_deg + delta_ra);

        // Same two-pass sidereal correction as an absolute slew
        let local_target = self.global_to_local(&state, global, 0.0);
        let (revs_dec, revs_ra) = self.revs_between(local_now, local_target);
        let travel_hours = self
            .motors
            .estimate_fast_turn_time(revs_dec, revs_ra)
            .as_secs_f64()
            / 3600.0;
        let local_target = self.global_to_local(&state, global, travel_hours);
        let (revs_dec, revs_ra) = self.revs_between(local_now, local_target);

        log::debug!(
            "relative global move to dec {:.4}, ra {:.4}",
            global.dec_deg,
            global.ra_deg
        );
        self.motors.fast_turn(revs_dec, revs_ra, false);
        state.target = global;
    }

    /// Store a new target RA and slew to the stored pair.
    pub fn set_target_ra(&self, ra_deg: f64) -> Result<(), MountError> {
        let target = {
            let state = self.state.lock().unwrap();
            EquatorialCoord::new(state.target.dec_deg, ra_deg)
        };
        self.move_absolute(target.dec_deg, target.ra_deg)
    }

    /// Store a new target declination and slew to the stored pair.
    pub fn set_target_dec(&self, dec_deg: f64) -> Result<(), MountError> {
        let target = {
            let state = self.state.lock().unwrap();
            EquatorialCoord::new(dec_deg, state.target.ra_deg)
        };
        self.move_absolute(target.dec_deg, target.ra_deg)
    }

    /// Start sidereal tracking of whatever the mount points at now.
    ///
    /// Computes the local-frame angular velocity that cancels the sky's
    /// 15 degree-per-hour rotation for the current pointing and issues one
    /// long queued microstepped move at that constant rate.
    pub fn set_tracking(&self) {
        let mut state = self.state.lock().unwrap();
        if state.is_tracking {
            return;
        }

        let local = self.get_local_mount_orientation();
        let global = self.local_to_global(&state, local);
        let hour_angle = wrap_360(self.clock.local_sidereal_deg() - global.ra_deg);

        let (unit_dec, unit_ra) = tracking_rate_unit(&state.pole, global.dec_deg, hour_angle);
        let rate_dec = SIDEREAL_RATE_DEG_PER_HOUR * unit_dec;
        let rate_ra = SIDEREAL_RATE_DEG_PER_HOUR * unit_ra;

        log::debug!(
            "tracking dec {:.4}, ra {:.4} at {:.6}/{:.6} deg per hour",
            global.dec_deg,
            global.ra_deg,
            rate_dec,
            rate_ra
        );

        let revs_per_hour_dec = rate_dec / 360.0 * self.config.gear_ratio_dec;
        let revs_per_hour_ra = rate_ra / 360.0 * self.config.gear_ratio_ra;
        self.motors.slow_turn(
            revs_per_hour_dec * self.config.tracking_horizon_hours,
            revs_per_hour_ra * self.config.tracking_horizon_hours,
            revs_per_hour_dec.abs() / 3600.0,
            revs_per_hour_ra.abs() / 3600.0,
            true,
        );
        state.is_tracking = true;
    }

    /// Stop tracking. Idempotent: a second call is a no-op and issues no
    /// motor commands.
    pub fn stop_tracking(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.is_tracking {
            return;
        }
        self.motors.stop();
        state.is_tracking = false;
    }

    /// Whether the controller is in the tracking state.
    pub fn is_tracking(&self) -> bool {
        self.state.lock().unwrap().is_tracking
    }

    /// Return to the zero-balance home position at slew speed.
    pub fn set_parking(&self) {
        self.motors.stop();
        self.state.lock().unwrap().is_tracking = false;
        let (dec_revs, ra_revs) = self.motors.made_revolutions();
        self.motors.fast_turn(-dec_revs, -ra_revs, false);
    }

    /// Fit and install a new pole from catalog/observed pairs.
    ///
    /// Catalog points must be in hour-angle form, i.e. the caller records
    /// `(dec, lst - ra)` at the moment each star was centered; the observed
    /// points are the local mount orientation at that same moment. This
    /// keeps the pairs time-independent, so stars centered minutes apart
    /// still constrain the same transform.
    ///
    /// The fit always installs its best candidate; the only rejection is
    /// malformed input. Installing the pole invalidates the previous
    /// transform for all subsequent orientation queries.
    pub fn all_star_alignment(
        &self,
        catalog: &[EquatorialCoord],
        observed: &[EquatorialCoord],
    ) -> Result<(), MountError> {
        self.align_with_rng(catalog, observed, &mut rand::thread_rng())
    }

    /// [`all_star_alignment`](Self::all_star_alignment) with an explicit RNG
    /// for deterministic calibration runs.
    pub fn align_with_rng<R: rand::Rng + ?Sized>(
        &self,
        catalog: &[EquatorialCoord],
        observed: &[EquatorialCoord],
        rng: &mut R,
    ) -> Result<(), MountError> {
        if catalog.is_empty() || catalog.len() != observed.len() {
            return Err(MountError::AlignmentInputMismatch {
                catalog: catalog.len(),
                observed: observed.len(),
            });
        }
        let pole = fit_pole(catalog, observed, &self.config.alignment, rng);
        let mut state = self.state.lock().unwrap();
        log::debug!("installing pole {pole:?}");
        state.set_pole(pole);
        Ok(())
    }

    fn revs_between(&self, from: EquatorialCoord, to: EquatorialCoord) -> (f64, f64) {
        (
            (to.dec_deg - from.dec_deg) / 360.0 * self.config.gear_ratio_dec,
            (to.ra_deg - from.ra_deg) / 360.0 * self.config.gear_ratio_ra,
        )
    }

    /// Global target to local frame, with the RA advanced by `advance_hours`
    /// of sidereal motion (the slew-duration correction).
    fn global_to_local(
        &self,
        state: &State,
        global: EquatorialCoord,
        advance_hours: f64,
    ) -> EquatorialCoord {
        let hour_angle = wrap_360(
            self.clock.local_sidereal_deg() + SIDEREAL_RATE_DEG_PER_HOUR * advance_hours
                - global.ra_deg,
        );
        EquatorialCoord::new(global.dec_deg, hour_angle).transformed(&state.transition)
    }

    fn local_to_global(&self, state: &State, local: EquatorialCoord) -> EquatorialCoord {
        let rotated = local.transformed(&state.transition_inverse);
        EquatorialCoord::new(
            rotated.dec_deg,
            wrap_360(self.clock.local_sidereal_deg() - rotated.ra_deg),
        )
    }
}

/// Unit-normalized local-frame rates `(w_dec, w_ra)` that cancel sidereal
/// motion for a point at the given global declination and hour angle.
///
/// Derived from the time derivative of the local z coordinate under the pole
/// tilt: `z = sin(pd) sin(d) + cos(pd) cos(d) cos(h - pr)`, so the local
/// declination rate is `dz/dt / sqrt(1 - z^2)` and the RA rate makes up the
/// remainder under `w_dec^2 + w_ra^2 = 1`. The mechanical RA offset rotates
/// about the local pole and drops out of z entirely.
fn tracking_rate_unit(pole: &PoleModel, dec_deg: f64, hour_angle_deg: f64) -> (f64, f64) {
    let pole_dec = pole.dec_deg.to_radians();
    let dec = dec_deg.to_radians();
    let relative_ha = (hour_angle_deg - pole.ra_deg).to_radians();

    let coscos = pole_dec.cos() * dec.cos();
    let z = pole_dec.sin() * dec.sin() + coscos * relative_ha.cos();
    let z_derivative = -coscos * relative_ha.sin();

    let flat = (1.0 - z * z).max(0.0).sqrt();
    let w_dec = if flat <= f64::EPSILON {
        0.0
    } else {
        z_derivative / flat
    };
    let w_ra = (1.0 - w_dec * w_dec).max(0.0).sqrt();
    (w_dec, w_ra)
}
