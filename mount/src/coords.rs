//! Celestial coordinate types and the pole-correction transform.
//!
//! Two frames share the same representation and must never be mixed without
//! an explicit transform: the *local* frame is read straight off the motor
//! step counters and knows nothing about polar alignment; the *global* frame
//! is the true celestial one. [`PoleModel::transition`] maps global unit
//! vectors into the local frame; its transpose maps back.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// A declination / right-ascension pair in degrees.
///
/// The frame (local or global) is contextual; a valid global coordinate has
/// `dec ∈ [-90, 90]` and `ra ∈ [0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquatorialCoord {
    pub dec_deg: f64,
    pub ra_deg: f64,
}

impl EquatorialCoord {
    pub fn new(dec_deg: f64, ra_deg: f64) -> Self {
        Self { dec_deg, ra_deg }
    }

    /// True iff this is a valid global coordinate.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.dec_deg) && (0.0..360.0).contains(&self.ra_deg)
    }

    /// Unit vector on the celestial sphere.
    pub fn to_unit_vector(&self) -> Vector3<f64> {
        let dec = self.dec_deg.to_radians();
        let ra = self.ra_deg.to_radians();
        Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
    }

    /// Coordinate of a unit vector, with RA normalized into `[0, 360)`.
    pub fn from_unit_vector(v: &Vector3<f64>) -> Self {
        let dec_deg = v.z.clamp(-1.0, 1.0).asin().to_degrees();
        let ra_deg = wrap_360(v.y.atan2(v.x).to_degrees());
        Self { dec_deg, ra_deg }
    }

    /// Apply a rotation to this coordinate through cartesian space.
    pub fn transformed(&self, rotation: &Matrix3<f64>) -> Self {
        Self::from_unit_vector(&(rotation * self.to_unit_vector()))
    }
}

/// Estimated orientation of the mount's mechanical pole.
///
/// `dec_deg`/`ra_deg` locate the mechanical rotation axis relative to the
/// celestial pole; `ra_offset_deg` is the mechanical zero point of the RA
/// axis. An ideally installed mount is `{ 90, 0, 0 }`, for which the
/// transition matrix is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoleModel {
    pub dec_deg: f64,
    pub ra_deg: f64,
    pub ra_offset_deg: f64,
}

impl Default for PoleModel {
    fn default() -> Self {
        Self {
            dec_deg: 90.0,
            ra_deg: 0.0,
            ra_offset_deg: 0.0,
        }
    }
}

impl PoleModel {
    /// Rotation taking global-frame unit vectors into the local mount frame.
    ///
    /// ZYZ composition: RA rotation to the pole's hour angle, declination
    /// tilt, then the mechanical RA zero offset. All three parameters are
    /// independently identifiable, which the alignment fit relies on.
    pub fn transition(&self) -> Matrix3<f64> {
        ra_rotation(self.ra_offset_deg) * dec_rotation(self.dec_deg) * ra_rotation(self.ra_deg)
    }

    /// Wrap all three parameters into their valid ranges.
    pub fn normalized(&self) -> Self {
        let mut dec = self.dec_deg % 180.0;
        if dec > 90.0 {
            dec -= 180.0;
        } else if dec < -90.0 {
            dec += 180.0;
        }
        Self {
            dec_deg: dec,
            ra_deg: wrap_360(self.ra_deg),
            ra_offset_deg: wrap_360(self.ra_offset_deg),
        }
    }
}

/// Rotation about the declination (y) axis; identity at 90 degrees.
pub fn dec_rotation(deg: f64) -> Matrix3<f64> {
    let (sin, cos) = deg.to_radians().sin_cos();
    Matrix3::new(
        sin, 0.0, -cos, //
        0.0, 1.0, 0.0, //
        cos, 0.0, sin,
    )
}

/// Rotation about the polar (z) axis; identity at 0 degrees.
pub fn ra_rotation(deg: f64) -> Matrix3<f64> {
    let (sin, cos) = deg.to_radians().sin_cos();
    Matrix3::new(
        cos, sin, 0.0, //
        -sin, cos, 0.0, //
        0.0, 0.0, 1.0,
    )
}

/// Normalize an angle into `[0, 360)` degrees.
pub fn wrap_360(deg: f64) -> f64 {
    let wrapped = deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Normalize an angle into `[-180, 180)` degrees.
pub fn wrap_180(deg: f64) -> f64 {
    wrap_360(deg + 180.0) - 180.0
}
