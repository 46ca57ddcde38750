use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub calibration: CalibrationConfig,
    pub eye: EyeConfig,
    pub pupil: PupilConfig,
    pub gaze: GazeConfig,
    pub focus: FocusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Expected share of the eye area covered by the iris.
    pub target_iris_ratio: f32,
    pub candidate_min: u8,
    pub candidate_max: u8,
    pub candidate_step: u8,
    /// Pixels ignored on each side when measuring the dark fraction.
    pub border_margin: u32,
    /// Samples per side before calibration counts as complete.
    pub min_samples: usize,
    /// `None` averages every sample ever seen; `Some(n)` keeps the last n.
    pub history_window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeConfig {
    /// Crop margin around the eye landmark polygon.
    pub region_margin: u32,
    /// Intensity painted outside the landmark polygon.
    pub mask_value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PupilConfig {
    /// Passes of a 3x3 erosion, then as many of a 3x3 dilation.
    pub kernel_iterations: u8,
}

/// Direction and blink cut-offs. All of these are tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Horizontal ratio at or below which the gaze is "right".
    pub right_threshold: f32,
    /// Horizontal ratio at or above which the gaze is "left".
    pub left_threshold: f32,
    /// Mean eye width/height ratio above which the eyes count as closed.
    pub blink_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub boundary_tolerance: f32,
    /// Located frames used to learn the eye boundary before scoring focus.
    pub calibration_frames: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_iris_ratio: 0.48,
            candidate_min: 5,
            candidate_max: 100,
            candidate_step: 5,
            border_margin: 5,
            min_samples: 20,
            history_window: None,
        }
    }
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            region_margin: 5,
            mask_value: 255,
        }
    }
}

impl Default for PupilConfig {
    fn default() -> Self {
        Self { kernel_iterations: 2 }
    }
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            right_threshold: 0.35,
            left_threshold: 0.65,
            blink_threshold: 5.7,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            boundary_tolerance: 5.0,
            calibration_frames: 30,
        }
    }
}

impl CalibrationConfig {
    /// Candidate thresholds in ascending scan order.
    pub fn candidates(&self) -> impl Iterator<Item = u8> {
        let step = usize::from(self.candidate_step.max(1));
        (self.candidate_min..=self.candidate_max).step_by(step)
    }
}

impl TrackerConfig {
    /// Loads a config file, falling back to defaults when it is missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            match serde_json::from_str::<TrackerConfig>(&content) {
                Ok(c) => {
                    info!("Loaded configuration from {}", path.display());
                    c
                }
                Err(e) => {
                    warn!("Error parsing config {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            }
        } else {
            info!("Configuration file {} not found. Using defaults.", path.display());
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("writing config {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.calibration;
        if c.candidate_step == 0 {
            bail!("calibration.candidate_step must be positive");
        }
        if c.candidate_min > c.candidate_max {
            bail!(
                "empty threshold candidate range {}..={}",
                c.candidate_min,
                c.candidate_max
            );
        }
        if let Some(window) = c.history_window {
            if window < c.min_samples.max(1) {
                bail!(
                    "calibration.history_window ({}) is smaller than min_samples ({})",
                    window,
                    c.min_samples
                );
            }
        }
        if self.gaze.left_threshold <= self.gaze.right_threshold {
            bail!(
                "gaze.left_threshold ({}) must exceed gaze.right_threshold ({})",
                self.gaze.left_threshold,
                self.gaze.right_threshold
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_candidates_cover_five_to_hundred() {
        let candidates: Vec<u8> = CalibrationConfig::default().candidates().collect();
        assert_eq!(candidates.len(), 20);
        assert_eq!(candidates.first(), Some(&5));
        assert_eq!(candidates.last(), Some(&100));
    }

    #[test]
    fn partial_file_fills_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "gaze": { "blink_threshold": 4.2 } }"#).unwrap();

        let config = TrackerConfig::load(&path).unwrap();
        assert_eq!(config.gaze.blink_threshold, 4.2);
        assert_eq!(config.gaze.left_threshold, 0.65);
        assert_eq!(config.calibration, CalibrationConfig::default());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = TrackerConfig::default();
        config.calibration.history_window = Some(50);
        config.save(&path).unwrap();

        assert_eq!(TrackerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn rejects_inverted_direction_thresholds() {
        let mut config = TrackerConfig::default();
        config.gaze.left_threshold = 0.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_window_shorter_than_min_samples() {
        let mut config = TrackerConfig::default();
        config.calibration.history_window = Some(5);
        assert!(config.validate().is_err());
    }
}
