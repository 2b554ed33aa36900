//! Low-order precession of J2000 catalog coordinates to the observation
//! epoch.
//!
//! Two-step approximation after Astrophysical Formulae Vol. II, accurate to
//! a few arcseconds over modest epoch ranges, which is well below the
//! mechanical pointing accuracy of the mount.

use time::OffsetDateTime;

use crate::clock::centuries_since_j2000;
use crate::coords::{wrap_360, EquatorialCoord};

/// Precess a J2000 coordinate to the given observation time.
pub fn precess_from_j2000(catalog: EquatorialCoord, at: OffsetDateTime) -> EquatorialCoord {
    let t = centuries_since_j2000(at);

    // Precession angles in degrees per the epoch offset in centuries
    let m = 1.281_232_3 * t + 0.000_387_9 * t * t + 0.000_010_1 * t * t * t;
    let n = 0.556_753_0 * t - 0.000_118_5 * t * t - 0.000_011_6 * t * t * t;
    let m_rad = m.to_radians();
    let n_rad = n.to_radians();

    let ra = catalog.ra_deg.to_radians();
    let dec = catalog.dec_deg.to_radians();

    // Midpoint pass
    let ra_mid = ra + 0.5 * (m_rad + n_rad * ra.sin() * dec.tan());
    let dec_mid = dec + 0.5 * n_rad * ra_mid.cos();

    // Full step evaluated at the midpoint
    let ra_new = ra + m_rad + n_rad * ra_mid.sin() * dec_mid.tan();
    let dec_new = dec + n_rad * ra_mid.cos();

    EquatorialCoord {
        dec_deg: dec_new.to_degrees().clamp(-90.0, 90.0),
        ra_deg: wrap_360(ra_new.to_degrees()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use time::macros::datetime;

    #[test]
    fn no_precession_at_epoch() {
        let coord = EquatorialCoord::new(20.0, 100.0);
        let at_epoch = precess_from_j2000(coord, datetime!(2000-01-01 12:00:00 UTC));
        assert_relative_eq!(at_epoch.dec_deg, 20.0, epsilon = 1e-9);
        assert_relative_eq!(at_epoch.ra_deg, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn equatorial_point_drifts_at_general_precession_rate() {
        // On the equator at RA 0, precession is almost purely the RA term m:
        // about 1.28 degrees per century.
        let coord = EquatorialCoord::new(0.0, 0.0);
        let later = precess_from_j2000(coord, datetime!(2050-01-01 12:00:00 UTC));
        assert_relative_eq!(later.ra_deg, 0.5 * 1.281_232_3, epsilon = 1e-3);
        // Declination picks up the n * cos(ra) term
        assert_relative_eq!(later.dec_deg, 0.5 * 0.556_753_0, epsilon = 1e-3);
    }

    #[test]
    fn precession_direction_reverses_before_epoch() {
        let coord = EquatorialCoord::new(0.0, 10.0);
        let past = precess_from_j2000(coord, datetime!(1950-01-01 12:00:00 UTC));
        assert!(past.ra_deg < 10.0);
    }
}
