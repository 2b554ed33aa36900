//! Clock capability consumed by the mount controller.
//!
//! The real-time-clock hardware lives outside this crate; the controller
//! only ever sees this trait, injected at construction. Swapping in
//! [`FixedClock`] makes every time-dependent computation deterministic in
//! tests and in the simulation harness.

use std::sync::Mutex;
use std::time::Duration;
use time::OffsetDateTime;

use crate::coords::wrap_360;

/// Julian day of the J2000.0 epoch (2000-01-01 12:00 UT).
const J2000_JD: f64 = 2_451_545.0;

/// Read-only wall-clock and site-longitude capability.
pub trait MountClock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> OffsetDateTime;

    /// Geographic longitude of the mount, degrees east-positive.
    fn longitude_deg(&self) -> f64;

    /// Local sidereal time in degrees, `[0, 360)`.
    fn local_sidereal_deg(&self) -> f64 {
        local_sidereal_deg(self.now(), self.longitude_deg())
    }
}

/// Clock backed by the host's UTC time.
#[derive(Debug, Clone)]
pub struct SystemClock {
    longitude_deg: f64,
}

impl SystemClock {
    pub fn new(longitude_deg: f64) -> Self {
        Self { longitude_deg }
    }
}

impl MountClock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn longitude_deg(&self) -> f64 {
        self.longitude_deg
    }
}

/// Settable clock for tests and simulation.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
    longitude_deg: f64,
}

impl FixedClock {
    pub fn new(now: OffsetDateTime, longitude_deg: f64) -> Self {
        Self {
            now: Mutex::new(now),
            longitude_deg,
        }
    }

    /// Pin the clock at the J2000.0 epoch, longitude zero.
    pub fn at_j2000() -> Self {
        Self::new(OffsetDateTime::from_unix_timestamp(946_728_000).unwrap(), 0.0)
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl MountClock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }

    fn longitude_deg(&self) -> f64 {
        self.longitude_deg
    }
}

/// Days since the J2000.0 epoch, fractional.
pub fn days_since_j2000(at: OffsetDateTime) -> f64 {
    let day = at.date().to_julian_day() as f64;
    let seconds = at.time().hour() as f64 * 3600.0
        + at.time().minute() as f64 * 60.0
        + at.time().second() as f64
        + at.time().nanosecond() as f64 / 1e9;
    // Julian days begin at noon
    day + seconds / 86_400.0 - 0.5 - J2000_JD
}

/// Julian centuries since the J2000.0 epoch.
pub fn centuries_since_j2000(at: OffsetDateTime) -> f64 {
    days_since_j2000(at) / 36_525.0
}

/// Greenwich mean sidereal time in degrees, low-precision polynomial.
pub fn greenwich_sidereal_deg(at: OffsetDateTime) -> f64 {
    let d = days_since_j2000(at);
    wrap_360(280.460_618_37 + 360.985_647_366_29 * d)
}

/// Local sidereal time in degrees for an east-positive longitude.
pub fn local_sidereal_deg(at: OffsetDateTime, longitude_deg: f64) -> f64 {
    wrap_360(greenwich_sidereal_deg(at) + longitude_deg)
}
