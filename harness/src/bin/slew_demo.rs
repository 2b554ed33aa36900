//! Simulated slew-and-track run against the recording driver.
//!
//! Wires the full stack the way firmware would (shared motor controller,
//! injected clock), slews to a target, reports the settled pointing error,
//! then tracks for a stretch of simulated time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use harness::{run_simulated, settle};
use motion::{MotorConfig, MotorController, RecordingDriver};
use mount::{FixedClock, MountConfig, MountController};

#[derive(Parser, Debug)]
#[command(about = "Simulated slew and tracking demonstration")]
struct Args {
    /// Target declination in degrees
    #[arg(long, default_value_t = 41.269)]
    dec: f64,

    /// Target right ascension in degrees
    #[arg(long, default_value_t = 10.685)]
    ra: f64,

    /// Simulated tracking duration in seconds after the slew
    #[arg(short = 't', long, default_value_t = 600.0)]
    track_seconds: f64,

    /// Site longitude in degrees, east-positive
    #[arg(long, default_value_t = 14.42)]
    longitude: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let motors = Arc::new(MotorController::new(
        MotorConfig::default(),
        RecordingDriver::new(),
    ));
    let clock = Arc::new(FixedClock::new(
        time::OffsetDateTime::now_utc(),
        args.longitude,
    ));
    let mount = MountController::new(MountConfig::default(), motors.clone(), clock.clone());
    mount.initialize();

    println!("slewing to dec {:.3}, ra {:.3}", args.dec, args.ra);
    mount.move_absolute(args.dec, args.ra)?;

    let Some(elapsed) = settle(&motors, &clock, Duration::from_secs(600)) else {
        bail!("slew did not settle within 600 simulated seconds");
    };
    let pointing = mount.get_global_mount_orientation();
    println!(
        "settled after {:.1}s at dec {:.4}, ra {:.4} (error {:.5} / {:.5} deg)",
        elapsed.as_secs_f64(),
        pointing.dec_deg,
        pointing.ra_deg,
        pointing.dec_deg - args.dec,
        pointing.ra_deg - args.ra,
    );

    mount.set_tracking();
    run_simulated(&motors, &clock, Duration::from_secs_f64(args.track_seconds));
    let tracked = mount.get_global_mount_orientation();
    println!(
        "after {:.0}s of tracking: dec {:.4}, ra {:.4} (drift {:.5} / {:.5} deg)",
        args.track_seconds,
        tracked.dec_deg,
        tracked.ra_deg,
        tracked.dec_deg - pointing.dec_deg,
        tracked.ra_deg - pointing.ra_deg,
    );
    mount.stop_tracking();

    Ok(())
}
