//! Attention tracking on top of pupil coordinates.
//!
//! An [`EyeBoundary`] learns the box the pupil moves in while the user looks
//! at the screen; afterwards a pupil outside that box (or no pupil at all)
//! counts as "looking away". A [`FocusSession`] keeps the per-frame verdicts.

use crate::sessions::SessionRecord;
use crate::types::PixelCoord;

#[derive(Debug, Clone)]
pub struct EyeBoundary {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    tolerance: f32,
}

impl EyeBoundary {
    const UNSET_MIN: u32 = 1_000_000;

    pub fn new(tolerance: f32) -> Self {
        Self {
            min_x: Self::UNSET_MIN,
            max_x: 0,
            min_y: Self::UNSET_MIN,
            max_y: 0,
            tolerance,
        }
    }

    /// Widens the boundary to include `coords`. Missing and origin samples are ignored.
    pub fn adjust(&mut self, coords: Option<PixelCoord>) {
        let Some(c) = coords else { return };
        if c == PixelCoord::new(0, 0) {
            return;
        }
        self.min_x = self.min_x.min(c.x);
        self.max_x = self.max_x.max(c.x);
        self.min_y = self.min_y.min(c.y);
        self.max_y = self.max_y.max(c.y);
    }

    /// Both axes have seen at least two distinct values.
    pub fn is_calibrated(&self) -> bool {
        self.max_x > self.min_x && self.max_y > self.min_y
    }

    /// True when the pupil is missing, the boundary is not learned yet, or
    /// `coords` falls outside the boundary widened by the tolerance.
    pub fn is_outside(&self, coords: Option<PixelCoord>) -> bool {
        let Some(c) = coords else { return true };
        if !self.is_calibrated() {
            return true;
        }
        let t = self.tolerance;
        let (x, y) = (c.x as f32, c.y as f32);
        x < self.min_x as f32 - t
            || x > self.max_x as f32 + t
            || y < self.min_y as f32 - t
            || y > self.max_y as f32 + t
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.tolerance);
    }

    /// `(min_x, max_x, min_y, max_y)` once calibrated.
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        self.is_calibrated()
            .then_some((self.min_x, self.max_x, self.min_y, self.max_y))
    }
}

/// Per-frame focus verdicts between a start and an end timestamp (Unix seconds).
#[derive(Debug, Clone)]
pub struct FocusSession {
    start_time: i64,
    timeline: Vec<bool>,
}

impl FocusSession {
    pub fn start(start_time: i64) -> Self {
        Self {
            start_time,
            timeline: Vec::new(),
        }
    }

    pub fn record(&mut self, focused: bool) {
        self.timeline.push(focused);
    }

    pub fn timeline(&self) -> &[bool] {
        &self.timeline
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn focus_percentage(&self) -> f32 {
        focus_percentage(&self.timeline)
    }

    /// Closes the session. The id is assigned when the record is stored.
    pub fn finish(self, end_time: i64) -> SessionRecord {
        SessionRecord {
            session_id: 0,
            start_time: self.start_time,
            end_time,
            focus_percentage: self.focus_percentage(),
            timeline: self.timeline,
        }
    }
}

fn focus_percentage(timeline: &[bool]) -> f32 {
    if timeline.is_empty() {
        return 0.0;
    }
    let focused = timeline.iter().filter(|&&f| f).count();
    focused as f32 / timeline.len() as f32 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: u32, y: u32) -> Option<PixelCoord> {
        Some(PixelCoord::new(x, y))
    }

    #[test]
    fn starts_uncalibrated_and_reports_outside() {
        let boundary = EyeBoundary::new(5.0);
        assert!(!boundary.is_calibrated());
        assert!(boundary.is_outside(at(100, 100)));
        assert_eq!(boundary.bounds(), None);
    }

    #[test]
    fn needs_a_range_on_both_axes() {
        let mut boundary = EyeBoundary::new(5.0);
        boundary.adjust(at(100, 200));
        assert!(!boundary.is_calibrated());

        boundary.adjust(at(50, 250));
        assert!(boundary.is_calibrated());
        assert_eq!(boundary.bounds(), Some((50, 100, 200, 250)));

        boundary.adjust(at(75, 225));
        assert_eq!(boundary.bounds(), Some((50, 100, 200, 250)));
    }

    #[test]
    fn ignores_missing_and_origin_samples() {
        let mut boundary = EyeBoundary::new(5.0);
        boundary.adjust(at(50, 200));
        boundary.adjust(at(100, 250));
        boundary.adjust(None);
        boundary.adjust(at(0, 0));
        assert_eq!(boundary.bounds(), Some((50, 100, 200, 250)));
    }

    #[test]
    fn checks_against_bounds_with_tolerance() {
        let mut boundary = EyeBoundary::new(5.0);
        boundary.adjust(at(100, 100));
        boundary.adjust(at(200, 200));

        assert!(!boundary.is_outside(at(150, 150)));
        assert!(!boundary.is_outside(at(100, 100)));
        assert!(!boundary.is_outside(at(200, 200)));
        assert!(!boundary.is_outside(at(96, 204)));

        assert!(boundary.is_outside(at(50, 150)));
        assert!(boundary.is_outside(at(250, 150)));
        assert!(boundary.is_outside(at(150, 50)));
        assert!(boundary.is_outside(at(150, 250)));
        assert!(boundary.is_outside(at(90, 90)));
        assert!(boundary.is_outside(at(210, 210)));
        assert!(boundary.is_outside(None));
    }

    #[test]
    fn reset_forgets_bounds() {
        let mut boundary = EyeBoundary::new(5.0);
        boundary.adjust(at(100, 100));
        boundary.adjust(at(200, 200));
        boundary.reset();
        assert!(!boundary.is_calibrated());
        assert!(boundary.is_outside(at(150, 150)));
    }

    #[test]
    fn session_percentage_counts_focused_frames() {
        let mut session = FocusSession::start(1_000);
        assert_eq!(session.focus_percentage(), 0.0);
        for f in [true, true, false, true] {
            session.record(f);
        }
        assert_eq!(session.focus_percentage(), 75.0);

        let record = session.finish(1_060);
        assert_eq!(record.start_time, 1_000);
        assert_eq!(record.end_time, 1_060);
        assert_eq!(record.timeline, vec![true, true, false, true]);
        assert_eq!(record.focus_percentage, 75.0);
    }
}
