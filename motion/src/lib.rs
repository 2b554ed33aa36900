//! Acceleration-ramped step generation for a two-axis equatorial mount.
//!
//! The [`MotorController`] owns one step generator per axis (declination and
//! right ascension) and turns [`MoveCommand`]s into sequences of step edges.
//! A periodic call to [`MotorController::trigger`] advances both axes by at
//! most one edge each and manages the acceleration ramp; everything else is
//! bookkeeping around a bounded command queue.
//!
//! Pin-level output goes through the [`StepDriver`] capability so the same
//! controller runs against real GPIO, a no-op driver, or the recording driver
//! used by the tests and the simulation harness.

pub mod command;
pub mod config;
pub mod controller;
pub mod driver;

pub use command::{CommandQueue, MoveCommand};
pub use config::{AxisConfig, MotorConfig};
pub use controller::MotorController;
pub use driver::{Axis, NullDriver, RecordingDriver, StepDriver};
