use crate::calibration::Calibration;
use crate::config::{GazeConfig, TrackerConfig};
use crate::detector::LandmarkDetector;
use crate::error::{GazeError, GazeResult};
use crate::eye::EyeRegion;
use crate::overlay::annotate_pupils;
use crate::pipeline::Pipeline;
use crate::pupil::Pupil;
use crate::types::{EyeSide, GazeDirection, GazeSnapshot, PixelCoord};
use anyhow::Result;
use image::{imageops, ImageBuffer, Rgb, RgbImage};
use tracing::debug;

impl GazeDirection {
    /// Buckets a horizontal ratio. Low ratios mean the pupils sit towards the
    /// image's left edge, i.e. the subject looks to their right.
    pub fn classify(horizontal_ratio: f32, config: &GazeConfig) -> Self {
        if horizontal_ratio <= config.right_threshold {
            GazeDirection::Right
        } else if horizontal_ratio >= config.left_threshold {
            GazeDirection::Left
        } else {
            GazeDirection::Center
        }
    }
}

// =========================================================================
// Pupil gaze tracker
// Landmarks -> eye regions -> calibrated threshold -> pupil blobs -> ratios
// =========================================================================
pub struct GazeTracker<D> {
    detector: D,
    config: TrackerConfig,
    calibration: Calibration,
    frame: Option<RgbImage>,
    outcome: Option<GazeResult<GazeSnapshot>>,
}

impl<D: LandmarkDetector> GazeTracker<D> {
    pub fn new(detector: D, config: TrackerConfig) -> Self {
        let calibration = Calibration::new(config.calibration.clone());
        Self {
            detector,
            config,
            calibration,
            frame: None,
            outcome: None,
        }
    }

    /// Processes one frame. Whatever happened to the previous frame is discarded.
    pub fn refresh(&mut self, frame: RgbImage) -> Option<&GazeSnapshot> {
        let outcome = self.analyze(&frame);
        if let Err(e) = &outcome {
            debug!(error = %e, "gaze unavailable for frame");
        }
        self.frame = Some(frame);
        self.outcome = Some(outcome);
        self.snapshot()
    }

    fn analyze(&mut self, frame: &RgbImage) -> GazeResult<GazeSnapshot> {
        let landmarks = match self.detector.detect_face(frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => return Err(GazeError::NoFaceDetected),
            Err(e) => return Err(GazeError::Detector(format!("{e:#}"))),
        };

        let gray = imageops::grayscale(frame);
        let left = EyeRegion::extract(&gray, &landmarks, EyeSide::Left, &self.config.eye)?;
        let right = EyeRegion::extract(&gray, &landmarks, EyeSide::Right, &self.config.eye)?;

        // Calibration keeps learning from every frame with usable eyes,
        // whether or not the pupils are found afterwards.
        self.calibration.evaluate(&left.image, EyeSide::Left);
        self.calibration.evaluate(&right.image, EyeSide::Right);

        let left_pupil = self.locate(&left)?;
        let right_pupil = self.locate(&right)?;

        let margin = self.config.eye.region_margin;
        let (left_h, left_v) = left.gaze_ratios(left_pupil.position, margin)?;
        let (right_h, right_v) = right.gaze_ratios(right_pupil.position, margin)?;
        let horizontal_ratio = (left_h + right_h) / 2.0;
        let vertical_ratio = (left_v + right_v) / 2.0;
        let blink_ratio = (left.blink_ratio + right.blink_ratio) / 2.0;

        Ok(GazeSnapshot {
            left_pupil: left_pupil.position.offset(left.origin),
            right_pupil: right_pupil.position.offset(right.origin),
            horizontal_ratio,
            vertical_ratio,
            blink_ratio,
            direction: GazeDirection::classify(horizontal_ratio, &self.config.gaze),
            blinking: blink_ratio > self.config.gaze.blink_threshold,
        })
    }

    fn locate(&self, region: &EyeRegion) -> GazeResult<Pupil> {
        let threshold = self.calibration.threshold(region.side)?;
        Pupil::locate(&region.image, threshold, region.side, &self.config.pupil)
    }

    pub fn snapshot(&self) -> Option<&GazeSnapshot> {
        self.outcome.as_ref().and_then(|o| o.as_ref().ok())
    }

    /// Why the last frame produced no gaze values, if it did not.
    pub fn failure(&self) -> Option<&GazeError> {
        self.outcome.as_ref().and_then(|o| o.as_ref().err())
    }

    pub fn pupils_located(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn pupil_left_coords(&self) -> Option<PixelCoord> {
        self.snapshot().map(|s| s.left_pupil)
    }

    pub fn pupil_right_coords(&self) -> Option<PixelCoord> {
        self.snapshot().map(|s| s.right_pupil)
    }

    /// 0.0 is the extreme right of the subject, 1.0 the extreme left.
    pub fn horizontal_ratio(&self) -> Option<f32> {
        self.snapshot().map(|s| s.horizontal_ratio)
    }

    /// 0.0 is the extreme top, 1.0 the extreme bottom.
    pub fn vertical_ratio(&self) -> Option<f32> {
        self.snapshot().map(|s| s.vertical_ratio)
    }

    pub fn blink_ratio(&self) -> Option<f32> {
        self.snapshot().map(|s| s.blink_ratio)
    }

    /// `None` when the last frame had no located pupils.
    pub fn direction(&self) -> Option<GazeDirection> {
        self.snapshot().map(|s| s.direction)
    }

    pub fn is_right(&self) -> bool {
        self.direction() == Some(GazeDirection::Right)
    }

    pub fn is_left(&self) -> bool {
        self.direction() == Some(GazeDirection::Left)
    }

    pub fn is_center(&self) -> bool {
        self.direction() == Some(GazeDirection::Center)
    }

    pub fn is_blinking(&self) -> bool {
        self.snapshot().is_some_and(|s| s.blinking)
    }

    /// Last frame with pupil cross-hairs, unmarked when pupils were not located.
    pub fn annotated_frame(&self) -> Option<RgbImage> {
        let frame = self.frame.as_ref()?;
        let pupils: Vec<PixelCoord> = self
            .snapshot()
            .map(|s| vec![s.left_pupil, s.right_pupil])
            .unwrap_or_default();
        Some(annotate_pupils(frame, &pupils))
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }
}

impl<D: LandmarkDetector> Pipeline for GazeTracker<D> {
    fn name(&self) -> String {
        "Pupil Gaze (Calibrated Threshold)".to_string()
    }

    fn process(&mut self, frame: &ImageBuffer<Rgb<u8>, Vec<u8>>) -> Result<Option<GazeSnapshot>> {
        Ok(self.refresh(frame.clone()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ScriptedDetector;
    use crate::eye::tests::{eye_outline, face_landmarks};
    use crate::types::Point;

    #[test]
    fn classify_uses_inclusive_thresholds() {
        let config = GazeConfig::default();
        assert_eq!(GazeDirection::classify(0.5, &config), GazeDirection::Center);
        assert_eq!(GazeDirection::classify(0.35, &config), GazeDirection::Right);
        assert_eq!(GazeDirection::classify(0.1, &config), GazeDirection::Right);
        assert_eq!(GazeDirection::classify(0.65, &config), GazeDirection::Left);
        assert_eq!(GazeDirection::classify(0.9, &config), GazeDirection::Left);
    }

    #[test]
    fn classify_follows_configured_thresholds() {
        let config = GazeConfig {
            right_threshold: 0.45,
            left_threshold: 0.55,
            ..GazeConfig::default()
        };
        assert_eq!(GazeDirection::classify(0.4, &config), GazeDirection::Right);
        assert_eq!(GazeDirection::classify(0.5, &config), GazeDirection::Center);
        assert_eq!(GazeDirection::classify(0.6, &config), GazeDirection::Left);
    }

    #[test]
    fn no_face_means_every_query_is_unavailable() {
        let mut tracker = GazeTracker::new(ScriptedDetector::new(), TrackerConfig::default());
        assert!(tracker.refresh(RgbImage::new(64, 48)).is_none());

        assert!(!tracker.pupils_located());
        assert!(matches!(tracker.failure(), Some(GazeError::NoFaceDetected)));
        assert_eq!(tracker.horizontal_ratio(), None);
        assert_eq!(tracker.vertical_ratio(), None);
        assert_eq!(tracker.pupil_left_coords(), None);
        assert_eq!(tracker.pupil_right_coords(), None);
        assert_eq!(tracker.direction(), None);
        assert!(!tracker.is_left() && !tracker.is_right() && !tracker.is_center());
        assert!(!tracker.is_blinking());
        assert_eq!(tracker.calibration().samples(EyeSide::Left), 0);
    }

    #[test]
    fn degenerate_landmarks_skip_calibration() {
        let outline = eye_outline(Point::new(30.0, 30.0), 20.0, 0.0);
        let detector = ScriptedDetector::fixed(face_landmarks(outline, outline));
        let mut tracker = GazeTracker::new(detector, TrackerConfig::default());

        tracker.refresh(RgbImage::from_pixel(64, 64, Rgb([200, 200, 200])));
        assert!(matches!(tracker.failure(), Some(GazeError::DegenerateLandmarks(_))));
        assert_eq!(tracker.calibration().samples(EyeSide::Right), 0);
    }

    #[test]
    fn failed_localization_still_feeds_calibration() {
        let lm = face_landmarks(
            eye_outline(Point::new(30.0, 30.0), 30.0, 14.0),
            eye_outline(Point::new(90.0, 30.0), 30.0, 14.0),
        );
        let mut tracker = GazeTracker::new(ScriptedDetector::fixed(lm), TrackerConfig::default());

        tracker.refresh(RgbImage::from_pixel(128, 64, Rgb([200, 200, 200])));
        assert!(matches!(tracker.failure(), Some(GazeError::LocalizationFailure(_))));
        assert_eq!(tracker.calibration().samples(EyeSide::Left), 1);
        assert_eq!(tracker.calibration().samples(EyeSide::Right), 1);
        let annotated = tracker.annotated_frame().unwrap();
        assert!(annotated.pixels().all(|p| *p == Rgb([200, 200, 200])));
    }

    #[test]
    fn detector_errors_are_per_frame() {
        struct Broken;
        impl LandmarkDetector for Broken {
            fn detect_face(&mut self, _frame: &RgbImage) -> Result<Option<crate::types::Landmarks>> {
                anyhow::bail!("model not loaded")
            }
        }

        let mut tracker = GazeTracker::new(Broken, TrackerConfig::default());
        assert!(tracker.refresh(RgbImage::new(8, 8)).is_none());
        let failure = tracker.failure().unwrap();
        assert!(failure.is_per_frame());
        assert!(failure.to_string().contains("model not loaded"));
    }

    #[test]
    fn annotated_frame_needs_a_frame() {
        let tracker = GazeTracker::new(ScriptedDetector::new(), TrackerConfig::default());
        assert!(tracker.annotated_frame().is_none());
    }
}
