//! End-to-end behavior of the mount controller against simulated motors.

mod common;

use std::time::Duration;

use common::{ra_difference, rig, MICROSTEP_DEG};
use mount::{EquatorialCoord, MountError};

#[test]
fn slew_lands_within_one_microstep_of_target() {
    let rig = rig();
    rig.mount.initialize();

    let dec = 30.0;
    let ra = 250.0;
    rig.mount.move_absolute(dec, ra).unwrap();
    assert!(rig.mount.is_moving());
    rig.settle();

    let pointing = rig.mount.get_global_mount_orientation();
    assert!(
        (pointing.dec_deg - dec).abs() <= MICROSTEP_DEG + 0.01,
        "dec error {} deg",
        pointing.dec_deg - dec
    );
    assert!(
        ra_difference(pointing.ra_deg, ra) <= MICROSTEP_DEG + 0.01,
        "ra error {} deg",
        ra_difference(pointing.ra_deg, ra)
    );
}

#[test]
fn out_of_range_targets_are_rejected_without_motion() {
    let rig = rig();
    rig.mount.initialize();
    rig.mount.move_absolute(10.0, 20.0).unwrap();
    rig.settle();

    for (dec, ra) in [(91.0, 0.0), (-90.5, 10.0), (0.0, 360.0), (0.0, -0.1)] {
        let result = rig.mount.move_absolute(dec, ra);
        assert_eq!(
            result,
            Err(MountError::TargetOutOfRange {
                dec_deg: dec,
                ra_deg: ra
            })
        );
        assert!(!rig.mount.is_moving(), "rejected slew must not move");
    }
    // The stored target survives every rejection
    assert_eq!(rig.mount.get_target(), EquatorialCoord::new(10.0, 20.0));
}

#[test]
fn stop_tracking_twice_is_idempotent() {
    let rig = rig();
    rig.mount.initialize();
    rig.mount.move_absolute(20.0, 300.0).unwrap();
    rig.settle();

    rig.mount.set_tracking();
    assert!(rig.mount.is_tracking());
    assert!(rig.mount.is_moving());

    rig.mount.stop_tracking();
    assert!(!rig.mount.is_tracking());
    assert!(!rig.mount.is_moving());

    let edges_before = rig.motors.made_revolutions();
    rig.mount.stop_tracking();
    assert!(!rig.mount.is_tracking());
    assert_eq!(rig.motors.made_revolutions(), edges_before);
}

#[test]
fn tracking_holds_the_global_pointing_against_the_sky() {
    let rig = rig();
    rig.mount.initialize();
    rig.mount.move_absolute(30.0, 250.0).unwrap();
    rig.settle();
    let before = rig.mount.get_global_mount_orientation();

    rig.mount.set_tracking();
    rig.run_for(Duration::from_secs(600));

    // Ten minutes of sky rotation is 2.5 degrees; tracked pointing should
    // hold to within the coarse test gearing's step quantization.
    let after = rig.mount.get_global_mount_orientation();
    assert!(
        ra_difference(after.ra_deg, before.ra_deg) <= 3.0 * MICROSTEP_DEG,
        "ra drifted {} deg",
        ra_difference(after.ra_deg, before.ra_deg)
    );
    assert!(
        (after.dec_deg - before.dec_deg).abs() <= 2.0 * MICROSTEP_DEG,
        "dec drifted {} deg",
        after.dec_deg - before.dec_deg
    );
    rig.mount.stop_tracking();
}

#[test]
fn set_target_components_trigger_slews() {
    let rig = rig();
    rig.mount.initialize();
    rig.mount.set_target_dec(45.0).unwrap();
    assert_eq!(rig.mount.get_target(), EquatorialCoord::new(45.0, 0.0));
    rig.settle();

    rig.mount.set_target_ra(90.0).unwrap();
    assert_eq!(rig.mount.get_target(), EquatorialCoord::new(45.0, 90.0));
    assert!(rig.mount.is_moving());
    rig.settle();

    let pointing = rig.mount.get_global_mount_orientation();
    assert!((pointing.dec_deg - 45.0).abs() <= MICROSTEP_DEG + 0.01);
}

#[test]
fn parking_returns_to_the_home_position() {
    let rig = rig();
    rig.mount.initialize();
    rig.mount.move_absolute(40.0, 200.0).unwrap();
    rig.settle();

    rig.mount.set_parking();
    rig.settle();

    let local = rig.mount.get_local_mount_orientation();
    assert!(local.dec_deg.abs() <= MICROSTEP_DEG, "dec {}", local.dec_deg);
    assert!(local.ra_deg.abs() <= MICROSTEP_DEG, "ra {}", local.ra_deg);
}

#[test]
fn j2000_slew_at_epoch_matches_plain_slew() {
    let rig = rig();
    rig.mount.initialize();
    // The clock is pinned at the J2000 epoch, so precession is zero and the
    // stored target must be exactly the catalog coordinate.
    rig.mount.move_absolute_j2000(15.0, 120.0).unwrap();
    let target = rig.mount.get_target();
    assert!((target.dec_deg - 15.0).abs() < 1e-9);
    assert!((target.ra_deg - 120.0).abs() < 1e-9);
    rig.settle();
}

#[test]
fn relative_local_move_clamps_at_the_dec_limit() {
    let rig = rig();
    rig.mount.initialize();
    rig.mount.move_relative_local(70.0, 0.0);
    rig.settle();
    // A further +40 would pass the pole; the clamp reduces it to land at 90
    rig.mount.move_relative_local(40.0, 0.0);
    rig.settle();

    let local = rig.mount.get_local_mount_orientation();
    assert!(
        local.dec_deg <= 90.0 + 1e-9,
        "dec exceeded the limit: {}",
        local.dec_deg
    );
    assert!(
        (local.dec_deg - 90.0).abs() <= 2.0 * MICROSTEP_DEG,
        "dec {} should sit at the clamp",
        local.dec_deg
    );
}

#[test]
fn relative_global_move_flips_over_the_pole() {
    let rig = rig();
    rig.mount.initialize();
    rig.mount.move_absolute(80.0, 100.0).unwrap();
    rig.settle();

    // +20 dec pushes past the pole: dec reflects to 80, RA gains 180
    rig.mount.move_relative_global(20.0, 0.0);
    let target = rig.mount.get_target();
    assert!((target.dec_deg - 80.0).abs() < MICROSTEP_DEG + 0.1);
    assert!(ra_difference(target.ra_deg, 280.0) < MICROSTEP_DEG + 0.1);
    rig.settle();
}
