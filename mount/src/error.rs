use thiserror::Error;

/// Errors surfaced by the mount controller.
///
/// All of these are recoverable, caller-visible rejections: the mount stays
/// stationary and no state is mutated. Nothing in the control core panics.
#[derive(Debug, Error, PartialEq)]
pub enum MountError {
    /// Requested coordinate is outside the valid celestial domain.
    #[error("target out of range: dec {dec_deg:.4}, ra {ra_deg:.4} (need dec in [-90, 90], ra in [0, 360))")]
    TargetOutOfRange { dec_deg: f64, ra_deg: f64 },

    /// Alignment input slices were empty or of mismatched length.
    #[error("alignment needs equally many catalog and observed points, got {catalog} and {observed}")]
    AlignmentInputMismatch { catalog: usize, observed: usize },
}
