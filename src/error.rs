//! Error types for gaze estimation.

use crate::types::EyeSide;
use thiserror::Error;

/// Result type for gaze operations.
pub type GazeResult<T> = Result<T, GazeError>;

/// Reasons a frame (or a single query) cannot produce gaze values.
///
/// The per-frame variants are normal outcomes, not faults: the tracker
/// records them and reports "unavailable" until the next frame.
#[derive(Debug, Error)]
pub enum GazeError {
    #[error("no face detected")]
    NoFaceDetected,

    #[error("degenerate eye landmarks: {0}")]
    DegenerateLandmarks(String),

    #[error("no pupil blob found in {0} eye")]
    LocalizationFailure(EyeSide),

    #[error("no calibration samples for {0} eye")]
    EmptyCalibrationHistory(EyeSide),

    #[error("landmark detector failed: {0}")]
    Detector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl GazeError {
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::DegenerateLandmarks(message.into())
    }

    /// True for outcomes that only affect the current frame.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Self::NoFaceDetected
                | Self::DegenerateLandmarks(_)
                | Self::LocalizationFailure(_)
                | Self::Detector(_)
        )
    }
}
