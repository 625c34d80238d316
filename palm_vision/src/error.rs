// THEORY:
// Every failure the library can report lives here, grouped by the component that
// produces it. Quality advisories (low brightness, the reserved blur state) are
// absent: they only disable the shutter and never travel as errors.
//
// Propagation follows the component boundaries:
// - `DeviceError` describes one failed acquisition attempt. It never leaves the
//   fallback chain on its own; the chain collects them.
// - `ViewfinderError::DeviceUnavailable` is the only camera failure callers see,
//   and only after every facing mode has been tried.
// - `InvalidLineData` marks a defect in the upstream analysis collaborator. The
//   animator either fails fast with it or skips the offending line.

use thiserror::Error;

use crate::core_modules::device::FacingMode;

/// A single failed request to the platform camera API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera matches the requested facing mode")]
    NotFound,

    #[error("requested resolution {width}x{height} is not supported")]
    Overconstrained { width: u32, height: u32 },

    #[error("camera error: {0}")]
    Other(String),
}

/// Errors surfaced by the viewfinder controller.
#[derive(Error, Debug)]
pub enum ViewfinderError {
    /// Every facing mode in the fallback order failed. Terminal until the user restarts.
    #[error("no camera could be acquired after {} attempts", attempts.len())]
    DeviceUnavailable {
        attempts: Vec<(FacingMode, DeviceError)>,
    },

    #[error("viewfinder is not streaming")]
    NotStreaming,

    #[error("frame source has not produced a frame yet")]
    NoFrame,

    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// A malformed `PalmLine` received from the analysis collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidLineData {
    #[error("line `{identifier}` has {count} point(s), at least 2 are required")]
    TooFewPoints { identifier: String, count: usize },

    #[error("line identifier `{0}` appears more than once")]
    DuplicateIdentifier(String),

    #[error("line `{identifier}` point {index} is outside the normalized [0, 1] range")]
    CoordinateOutOfRange { identifier: String, index: usize },
}

/// Errors surfaced by the line animator.
#[derive(Error, Debug)]
pub enum AnimatorError {
    #[error("invalid line data: {0}")]
    InvalidLineData(#[from] InvalidLineData),

    #[error("failed to decode backing image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("drawing surface has zero area")]
    ZeroSizedSurface,

    #[error("animation was cancelled before completion")]
    Cancelled,
}

/// Errors from the external analysis collaborator boundary.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The collaborator answered with an `{"error": ...}` body.
    #[error("analysis service error: {0}")]
    Service(String),

    #[error("malformed analysis response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),
}
