pub mod calibration;
pub mod config;
pub mod detector;
pub mod error;
pub mod eye;
pub mod focus;
pub mod gaze;
pub mod overlay;
pub mod pipeline;
pub mod pupil;
pub mod sessions;
pub mod types;

pub use calibration::Calibration;
pub use config::TrackerConfig;
pub use detector::{LandmarkDetector, ScriptedDetector};
pub use error::{GazeError, GazeResult};
pub use gaze::GazeTracker;
pub use types::{EyeSide, GazeDirection, GazeSnapshot, Landmarks, PixelCoord, Point};
