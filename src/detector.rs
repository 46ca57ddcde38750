use crate::types::Landmarks;
use anyhow::Result;
use image::RgbImage;
use std::collections::VecDeque;

/// Face landmark provider.
///
/// Returns `Ok(None)` when no face is present, which is an ordinary outcome.
/// `Err` is reserved for backend failures (model errors and the like).
pub trait LandmarkDetector {
    fn detect_face(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>>;
}

/// Replays pre-computed landmarks, one entry per `detect_face` call.
///
/// An exhausted queue behaves like an empty scene.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    queue: VecDeque<Option<Landmarks>>,
    repeat_last: Option<Landmarks>,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answers with the same landmarks.
    pub fn fixed(landmarks: Landmarks) -> Self {
        Self {
            queue: VecDeque::new(),
            repeat_last: Some(landmarks),
        }
    }

    pub fn push(&mut self, landmarks: Option<Landmarks>) {
        self.queue.push_back(landmarks);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect_face(&mut self, _frame: &RgbImage) -> Result<Option<Landmarks>> {
        match self.queue.pop_front() {
            Some(next) => Ok(next),
            None => Ok(self.repeat_last.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    #[test]
    fn scripted_detector_replays_in_order() {
        let frame = RgbImage::new(4, 4);
        let mut det = ScriptedDetector::new();
        det.push(Some(Landmarks::new(vec![Point::new(1.0, 2.0)])));
        det.push(None);

        let first = det.detect_face(&frame).unwrap().unwrap();
        assert_eq!(first.points[0], Point::new(1.0, 2.0));
        assert!(det.detect_face(&frame).unwrap().is_none());
        assert!(det.detect_face(&frame).unwrap().is_none());
        assert_eq!(det.pending(), 0);
    }

    #[test]
    fn fixed_detector_falls_back_after_queue() {
        let frame = RgbImage::new(4, 4);
        let mut det = ScriptedDetector::fixed(Landmarks::new(vec![Point::new(3.0, 3.0)]));
        det.push(None);

        assert!(det.detect_face(&frame).unwrap().is_none());
        assert!(det.detect_face(&frame).unwrap().is_some());
        assert!(det.detect_face(&frame).unwrap().is_some());
    }
}
