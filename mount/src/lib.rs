//! Equatorial mount control: coordinate kinematics, polar-misalignment
//! calibration and sidereal tracking.
//!
//! The [`MountController`] sits between a protocol layer (LX200 or similar,
//! out of scope here) and the [`motion`] crate's step generators. It keeps no
//! orientation of its own: the mount's pointing is recomputed on every query
//! from the motor controller's cumulative revolution balance, so the step
//! counters are the single source of truth for position and this crate only
//! owns the pole-correction transform that maps the raw "local" frame onto
//! true celestial coordinates.

pub mod alignment;
pub mod clock;
pub mod controller;
pub mod coords;
pub mod error;
pub mod precession;

pub use alignment::AlignmentConfig;
pub use clock::{FixedClock, MountClock, SystemClock};
pub use controller::{MountConfig, MountController};
pub use coords::{EquatorialCoord, PoleModel};
pub use error::MountError;

/// Apparent angular rate of the sky, in degrees per hour.
pub const SIDEREAL_RATE_DEG_PER_HOUR: f64 = 15.0;
