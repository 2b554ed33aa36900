use std::sync::Mutex;

/// The two mechanical rotation stages of the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Dec,
    Ra,
}

/// Pin-level output capability for the step generators.
///
/// The controller calls into this trait from inside its lock, so
/// implementations must be cheap and must never block.
pub trait StepDriver: Send {
    /// Drive the direction line for an axis.
    fn set_direction(&self, axis: Axis, reverse: bool);

    /// Toggle the step line for an axis, returning the new line level.
    fn toggle_step(&self, axis: Axis) -> bool;

    /// Enable or disable microstepping for an axis.
    fn set_microstepping(&self, axis: Axis, enabled: bool);

    /// Force the step line low (used on stop so no pulse is left half-done).
    fn release(&self, axis: Axis);
}

/// Driver that discards all output.
#[derive(Debug, Default)]
pub struct NullDriver;

impl StepDriver for NullDriver {
    fn set_direction(&self, _axis: Axis, _reverse: bool) {}

    fn toggle_step(&self, _axis: Axis) -> bool {
        false
    }

    fn set_microstepping(&self, _axis: Axis, _enabled: bool) {}

    fn release(&self, _axis: Axis) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct AxisRecord {
    level: bool,
    reverse: bool,
    microstepping: bool,
    edges: u64,
}

/// Driver that records every pin transition, for tests and simulation.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    dec: Mutex<AxisRecord>,
    ra: Mutex<AxisRecord>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn axis(&self, axis: Axis) -> &Mutex<AxisRecord> {
        match axis {
            Axis::Dec => &self.dec,
            Axis::Ra => &self.ra,
        }
    }

    /// Number of step edges emitted on an axis since construction.
    pub fn edges(&self, axis: Axis) -> u64 {
        self.axis(axis).lock().unwrap().edges
    }

    /// Last commanded direction for an axis.
    pub fn reverse(&self, axis: Axis) -> bool {
        self.axis(axis).lock().unwrap().reverse
    }

    /// Current microstepping setting for an axis.
    pub fn microstepping(&self, axis: Axis) -> bool {
        self.axis(axis).lock().unwrap().microstepping
    }
}

impl StepDriver for RecordingDriver {
    fn set_direction(&self, axis: Axis, reverse: bool) {
        self.axis(axis).lock().unwrap().reverse = reverse;
    }

    fn toggle_step(&self, axis: Axis) -> bool {
        let mut record = self.axis(axis).lock().unwrap();
        record.level = !record.level;
        record.edges += 1;
        record.level
    }

    fn set_microstepping(&self, axis: Axis, enabled: bool) {
        self.axis(axis).lock().unwrap().microstepping = enabled;
    }

    fn release(&self, axis: Axis) {
        self.axis(axis).lock().unwrap().level = false;
    }
}
